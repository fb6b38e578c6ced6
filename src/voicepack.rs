//! Voicepack store: named style vectors conditioning synthesis on a speaker.
//!
//! Voicepacks are loaded once at start-up and never mutated afterwards.
//! Every stored style vector is normalised to exactly [`STYLE_DIM`] floats at
//! load time, so the request path only ever borrows a ready `[f32; 256]`.
//!
//! Accepted files inside the voicepack directory:
//!
//! | File            | Contents                                               |
//! |-----------------|--------------------------------------------------------|
//! | `<voice>.npy`   | one tensor, shape `(256,)`, `(N, 256)` or `(N, 1, 256)` |
//! | `<voice>.bin`   | raw little-endian f32, read as `(len / 256, 256)`      |
//! | `<voice>.npz`   | one member → voice `<voice>`; several members → catalog |

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::{debug, info, warn};

use crate::{
    error::{TtsError, TtsResult},
    npz::{load_npy, load_npz, NpyArray},
};

/// Length of a canonical style vector.
pub const STYLE_DIM: usize = 256;

/// A single style vector, as handed to every backend.
pub type Style = [f32; STYLE_DIM];

// ─────────────────────────────────────────────────────────────────────────────
// Shape normalisation
// ─────────────────────────────────────────────────────────────────────────────

/// Reduce a voicepack tensor to one `(256,)` style vector.
///
/// Rank-1 input is used as is. For higher ranks the first embedding along the
/// leading axis is taken, and what remains must flatten to exactly 256 values
/// with a trailing dimension of 256 (so `(N, 256)` and `(N, 1, 256)` both work).
pub fn normalize_style(shape: &[usize], data: &[f32]) -> TtsResult<Style> {
    let invalid = || TtsError::InvalidVoicepackShape {
        shape: shape.to_vec(),
        expected: STYLE_DIM,
    };

    let (&leading, rest) = shape.split_first().ok_or_else(invalid)?;
    let (reduced_shape, row): (&[usize], usize) = if rest.is_empty() {
        (shape, leading)
    } else {
        if leading == 0 {
            return Err(invalid());
        }
        (rest, rest.iter().product())
    };

    if reduced_shape.last() != Some(&STYLE_DIM) || row != STYLE_DIM || data.len() < row {
        return Err(invalid());
    }

    let mut style = [0f32; STYLE_DIM];
    style.copy_from_slice(&data[..STYLE_DIM]);
    Ok(style)
}

// ─────────────────────────────────────────────────────────────────────────────
// Voicepack
// ─────────────────────────────────────────────────────────────────────────────

/// A loaded, normalised voice.
#[derive(Debug, Clone)]
pub struct Voicepack {
    pub name: String,
    pub style: Style,
    /// Shape of the tensor the style vector was reduced from.
    pub source_shape: Vec<usize>,
    pub loaded_at: SystemTime,
}

impl Voicepack {
    fn from_array(name: String, array: NpyArray) -> TtsResult<Self> {
        let style = normalize_style(&array.shape, &array.data)?;
        Ok(Self {
            name,
            style,
            source_shape: array.shape,
            loaded_at: SystemTime::now(),
        })
    }
}

/// Read a headerless f32 voice file (`voices/<name>.bin`).
fn load_raw_f32(path: &Path) -> TtsResult<NpyArray> {
    let bytes = std::fs::read(path)?;
    if bytes.len() % 4 != 0 || bytes.len() / 4 % STYLE_DIM != 0 || bytes.is_empty() {
        return Err(TtsError::InvalidVoicepackShape {
            shape: vec![bytes.len() / 4],
            expected: STYLE_DIM,
        });
    }
    let data: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(NpyArray { shape: vec![data.len() / STYLE_DIM, STYLE_DIM], data })
}

fn load_failure(path: &Path, err: anyhow::Error) -> TtsError {
    TtsError::VoicepackLoad { path: path.to_path_buf(), reason: format!("{err:#}") }
}

/// The entry, or `None` after logging why it could not be read.
fn readable_entry<T>(dir: &Path, entry: std::io::Result<T>) -> Option<T> {
    entry
        .inspect_err(|e| warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry"))
        .ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// VoicepackStore
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable name → voicepack map, shared read-only by every request.
#[derive(Debug, Default)]
pub struct VoicepackStore {
    voices: HashMap<String, Voicepack>,
}

impl VoicepackStore {
    /// Scan `dir` and load every recognised voicepack file.
    ///
    /// A file that fails to load is logged and skipped; the call only fails if
    /// the directory is missing or nothing at all could be loaded.
    pub fn load(dir: &Path) -> TtsResult<Self> {
        if !dir.is_dir() {
            return Err(TtsError::NotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| readable_entry(dir, entry).map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut store = Self::default();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);

            let loaded = match ext.as_deref() {
                Some("npy") => load_npy(&path)
                    .map_err(|e| load_failure(&path, e))
                    .and_then(|arr| Voicepack::from_array(stem.to_string(), arr))
                    .map(|v| vec![v]),
                Some("bin") => load_raw_f32(&path)
                    .and_then(|arr| Voicepack::from_array(stem.to_string(), arr))
                    .map(|v| vec![v]),
                Some("npz") => Self::load_archive(&path, Some(stem)),
                _ => {
                    debug!(path = %path.display(), "Ignoring non-voicepack file");
                    continue;
                }
            };

            match loaded {
                Ok(voices) => {
                    for voice in voices {
                        debug!(voice = %voice.name, shape = ?voice.source_shape, "Loaded voicepack");
                        store.insert(voice);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping voicepack"),
            }
        }

        if store.is_empty() {
            return Err(TtsError::NoVoicepacks(dir.to_path_buf()));
        }
        info!(count = store.len(), dir = %dir.display(), "Voicepacks loaded");
        Ok(store)
    }

    /// Load every member of a catalog archive (e.g. Kokoro's `voices.npz`).
    pub fn from_catalog(path: &Path) -> TtsResult<Self> {
        if !path.is_file() {
            return Err(TtsError::NotFound(path.to_path_buf()));
        }
        let mut store = Self::default();
        for voice in Self::load_archive(path, None)? {
            store.insert(voice);
        }
        if store.is_empty() {
            return Err(TtsError::NoVoicepacks(path.to_path_buf()));
        }
        info!(count = store.len(), catalog = %path.display(), "Voicepacks loaded");
        Ok(store)
    }

    /// Load from a directory or a single catalog archive, whichever `path` is.
    pub fn open(path: &Path) -> TtsResult<Self> {
        if path.is_file() {
            Self::from_catalog(path)
        } else {
            Self::load(path)
        }
    }

    /// Members of an archive. A single-member archive takes `single_name` when given.
    fn load_archive(path: &Path, single_name: Option<&str>) -> TtsResult<Vec<Voicepack>> {
        let arrays = load_npz(path).map_err(|e| load_failure(path, e))?;
        let rename = arrays.len() == 1;

        let mut voices = Vec::with_capacity(arrays.len());
        for (member, array) in arrays {
            let name = match single_name {
                Some(n) if rename => n.to_string(),
                _ => member,
            };
            match Voicepack::from_array(name, array) {
                Ok(v) => voices.push(v),
                Err(e) => warn!(archive = %path.display(), error = %e, "Skipping catalog entry"),
            }
        }
        Ok(voices)
    }

    fn insert(&mut self, voice: Voicepack) {
        if self.voices.contains_key(&voice.name) {
            warn!(voice = %voice.name, "Duplicate voicepack; keeping the first one loaded");
            return;
        }
        self.voices.insert(voice.name.clone(), voice);
    }

    /// Build a store from already-normalised voicepacks.
    pub fn from_voicepacks(voices: impl IntoIterator<Item = Voicepack>) -> Self {
        let mut store = Self::default();
        for voice in voices {
            store.insert(voice);
        }
        store
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Option<&Voicepack> {
        self.voices.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.voices.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Voice names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up `name`, falling back to `default_name` when it is empty or unknown.
    pub fn resolve(&self, name: Option<&str>, default_name: &str) -> TtsResult<&Voicepack> {
        if let Some(voice) = name.filter(|n| !n.is_empty()).and_then(|n| self.voices.get(n)) {
            return Ok(voice);
        }
        warn!(
            requested = name.unwrap_or(""),
            default = default_name,
            "Invalid or unknown voice, falling back to default voice"
        );
        self.voices.get(default_name).ok_or_else(|| TtsError::UnknownVoice {
            requested: name.unwrap_or_default().to_string(),
            default: default_name.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npz::encode_npy;
    use std::io::Write;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let dir = Path::new("/voices");
        assert_eq!(readable_entry(dir, Ok(7)), Some(7));
        let denied: std::io::Result<u8> = Err(std::io::ErrorKind::PermissionDenied.into());
        assert_eq!(readable_entry(dir, denied), None);
    }

    #[test]
    fn test_normalize_rank1() {
        let data = ramp(STYLE_DIM);
        let style = normalize_style(&[STYLE_DIM], &data).unwrap();
        assert_eq!(style.as_slice(), data.as_slice());
    }

    #[test]
    fn test_normalize_selects_first_embedding() {
        for n in [1usize, 2, 510] {
            let data = ramp(n * STYLE_DIM);
            let expected = &data[..STYLE_DIM];

            let style = normalize_style(&[n, STYLE_DIM], &data).unwrap();
            assert_eq!(style.as_slice(), expected, "(N, 256) with N = {n}");

            let style = normalize_style(&[n, 1, STYLE_DIM], &data).unwrap();
            assert_eq!(style.as_slice(), expected, "(N, 1, 256) with N = {n}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let data = ramp(3 * STYLE_DIM);
        let once = normalize_style(&[3, 1, STYLE_DIM], &data).unwrap();
        let twice = normalize_style(&[STYLE_DIM], &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_rejects_bad_trailing_dim() {
        for shape in [vec![128], vec![2, 255], vec![4, 1, 512], vec![2, 256, 1], vec![0, 256], vec![]] {
            let data = ramp(shape.iter().product::<usize>().max(1));
            let err = normalize_style(&shape, &data).unwrap_err();
            assert!(
                matches!(err, TtsError::InvalidVoicepackShape { .. }),
                "shape {shape:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_missing_dir() {
        let err = VoicepackStore::load(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, TtsError::NotFound(_)));
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.txt"), "not a voice").unwrap();
        let err = VoicepackStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, TtsError::NoVoicepacks(_)));
    }

    #[test]
    fn test_load_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = ramp(2 * STYLE_DIM);
        std::fs::write(dir.path().join("af_bella.npy"), encode_npy(&[2, 1, STYLE_DIM], &data)).unwrap();
        std::fs::write(dir.path().join("bad_shape.npy"), encode_npy(&[2, 100], &ramp(200))).unwrap();
        std::fs::write(dir.path().join("corrupt.npy"), b"garbage").unwrap();

        let raw: Vec<u8> = ramp(STYLE_DIM).iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.path().join("am_adam.bin"), raw).unwrap();

        let store = VoicepackStore::load(dir.path()).unwrap();
        assert_eq!(store.names(), vec!["af_bella", "am_adam"]);
        let bella = store.get("af_bella").unwrap();
        assert_eq!(bella.style.as_slice(), &data[..STYLE_DIM]);
        assert_eq!(bella.source_shape, vec![2, 1, STYLE_DIM]);
    }

    #[test]
    fn test_catalog_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voices.npz");
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let opts = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, offset) in [("af_sky", 0.0f32), ("bf_emma", 1.0)] {
            let data: Vec<f32> = ramp(STYLE_DIM).iter().map(|v| v + offset).collect();
            zip.start_file(format!("{name}.npy"), opts).unwrap();
            zip.write_all(&encode_npy(&[1, STYLE_DIM], &data)).unwrap();
        }
        zip.finish().unwrap();

        let store = VoicepackStore::open(&path).unwrap();
        assert_eq!(store.names(), vec!["af_sky", "bf_emma"]);
        assert_eq!(store.get("bf_emma").unwrap().style[0], 1.0);
    }

    fn store_with(names: &[&str]) -> VoicepackStore {
        VoicepackStore::from_voicepacks(names.iter().enumerate().map(|(i, n)| Voicepack {
            name: n.to_string(),
            style: [i as f32; STYLE_DIM],
            source_shape: vec![STYLE_DIM],
            loaded_at: SystemTime::now(),
        }))
    }

    #[test]
    fn test_resolve_fallback() {
        let store = store_with(&["af_bella", "af_sky"]);
        assert_eq!(store.resolve(Some("af_sky"), "af_bella").unwrap().name, "af_sky");
        assert_eq!(store.resolve(Some("nope"), "af_bella").unwrap().name, "af_bella");
        assert_eq!(store.resolve(Some(""), "af_bella").unwrap().name, "af_bella");
        assert_eq!(store.resolve(None, "af_bella").unwrap().name, "af_bella");
    }

    #[test]
    fn test_resolve_missing_default() {
        let store = store_with(&["af_sky"]);
        let err = store.resolve(Some("nope"), "af_bella").unwrap_err();
        assert!(matches!(err, TtsError::UnknownVoice { .. }));
    }
}
