//! Minimal NPY / NPZ reader for voicepack tensors.
//!
//! Supports the subset of the NumPy array format voicepacks are exported in:
//!   - NPY format version 1.0, 2.0 and 3.0
//!   - `float32` (`<f4`, `>f4`) and `float64` (`<f8`, `>f8`) dtypes, read as f32
//!   - C-contiguous (row-major) layout
//!   - Any rank (voicepacks arrive as `(256,)`, `(N, 256)` or `(N, 1, 256)`)
//!
//! NPZ files are ZIP archives whose members are `.npy` files.
//! Each member name without its `.npy` extension is the array name.

use anyhow::{bail, Context, Result};
use std::{collections::HashMap, io::Read, path::Path};
use zip::ZipArchive;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

// ─────────────────────────────────────────────────────────────────────────────
// NPY header parser
// ─────────────────────────────────────────────────────────────────────────────

/// Element type of an NPY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn width(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

/// A loaded array: shape plus flat f32 data in row-major (C) order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NpyArray {
    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Parse a raw `.npy` byte buffer.
pub fn parse_npy(data: &[u8]) -> Result<NpyArray> {
    if data.len() < 10 || &data[..6] != MAGIC {
        bail!("Not a valid NPY file (bad magic)");
    }

    let major = data[6];

    // Header length: 2 bytes (v1) or 4 bytes (v2/v3), little-endian.
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        2 | 3 => {
            if data.len() < 12 {
                bail!("NPY v{} file too short", major);
            }
            let len = u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
            (len, 12)
        }
        _ => bail!("Unsupported NPY version {}.{}", major, data[7]),
    };

    let header_end = header_start + header_len;
    if data.len() < header_end {
        bail!("NPY file truncated in header");
    }
    let header = std::str::from_utf8(&data[header_start..header_end])
        .context("NPY header is not valid UTF-8")?;

    let descr = extract_header_field(header, "descr").context("NPY header missing 'descr'")?;
    let descr = descr.trim().trim_matches('\'').trim_matches('"');
    let (dtype, big_endian) = match descr {
        "<f4" | "=f4" | "|f4" => (Dtype::F32, false),
        ">f4" => (Dtype::F32, true),
        "<f8" | "=f8" | "|f8" => (Dtype::F64, false),
        ">f8" => (Dtype::F64, true),
        other => bail!("Unsupported dtype '{}': only float32/float64 are supported", other),
    };

    let fortran = extract_header_field(header, "fortran_order")
        .unwrap_or("False")
        .trim()
        .to_ascii_lowercase();
    if fortran == "true" {
        bail!("Fortran-order arrays are not supported");
    }

    let shape_str = extract_header_field(header, "shape").context("NPY header missing 'shape'")?;
    let shape = parse_shape(shape_str.trim())?;
    let needed = shape
        .iter()
        .try_fold(dtype.width(), |acc, &dim| acc.checked_mul(dim))
        .with_context(|| format!("NPY shape {:?} is too large", shape))?;

    let payload = &data[header_end..];
    if payload.len() < needed {
        bail!(
            "NPY data section too short: expected {} bytes, got {}",
            needed,
            payload.len()
        );
    }

    let values: Vec<f32> = match dtype {
        Dtype::F32 => payload[..needed]
            .chunks_exact(4)
            .map(|b| {
                let arr = [b[0], b[1], b[2], b[3]];
                if big_endian { f32::from_be_bytes(arr) } else { f32::from_le_bytes(arr) }
            })
            .collect(),
        Dtype::F64 => payload[..needed]
            .chunks_exact(8)
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                let v = if big_endian { f64::from_be_bytes(arr) } else { f64::from_le_bytes(arr) };
                v as f32
            })
            .collect(),
    };

    Ok(NpyArray { shape, data: values })
}

/// Extract the value of a field from a Python-literal dict header string.
///
/// e.g. `extract_header_field("{'descr': '<f4', 'shape': (3,)}", "descr")`
/// returns `Some("<f4")`.
fn extract_header_field<'a>(header: &'a str, field: &str) -> Option<&'a str> {
    let key_sq = format!("'{}':", field);
    let key_dq = format!("\"{}\":", field);

    let start = header
        .find(key_sq.as_str())
        .map(|p| p + key_sq.len())
        .or_else(|| header.find(key_dq.as_str()).map(|p| p + key_dq.len()))?;

    let rest = header[start..].trim_start();

    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..end + 1])
    } else if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.chars().next()?;
        let inner = &rest[1..];
        let end = inner.find(quote)?;
        Some(&inner[..end])
    } else {
        let end = rest.find([',', '}']).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

/// Parse a Python-style shape tuple like `(510, 1, 256)`, `(256,)` or `()`.
fn parse_shape(s: &str) -> Result<Vec<usize>> {
    let inner = s.trim_start_matches('(').trim_end_matches(')');
    inner
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().with_context(|| format!("Bad shape dim: '{}'", t)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// File loaders
// ─────────────────────────────────────────────────────────────────────────────

/// Load a single `.npy` file.
pub fn load_npy(path: &Path) -> Result<NpyArray> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read NPY file: {}", path.display()))?;
    parse_npy(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load an NPZ file and return all arrays indexed by name (`.npy` extension stripped).
pub fn load_npz(path: &Path) -> Result<HashMap<String, NpyArray>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open NPZ file: {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Cannot open ZIP archive: {}", path.display()))?;

    let mut arrays = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("Failed to read ZIP entry")?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().trim_end_matches(".npy").to_string();

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).context("Failed to read NPY entry")?;

        let array = parse_npy(&buf)
            .with_context(|| format!("Failed to parse NPY entry '{}'", name))?;
        arrays.insert(name, array);
    }

    Ok(arrays)
}

/// Serialise an f32 array as NPY v1.0 (little-endian, C order).
#[cfg(test)]
pub(crate) fn encode_npy(shape: &[usize], values: &[f32]) -> Vec<u8> {
    let dims = shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ");
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}{}), }}",
        dims,
        if shape.len() == 1 { "," } else { "" }
    );
    // Preamble + header + '\n' is padded to a multiple of 64 bytes.
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut buf = Vec::with_capacity(10 + header.len() + values.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
    buf.extend_from_slice(header.as_bytes());
    for &v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
