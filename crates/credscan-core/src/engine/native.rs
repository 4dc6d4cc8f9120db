use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::{CStr, CString, c_char, c_int};
use std::path::{Path, PathBuf};

use credscan_types::{DocumentSide, EngineInfo, ErrorKind, RawFields};
use libloading::Library;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{EngineError, RecognitionEngine};

type ExtractFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut c_char;
type PrecheckFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type EngineInfoFn = unsafe extern "C" fn() -> *mut c_char;
type FreeStringFn = unsafe extern "C" fn(*mut c_char);

/// Recognition engine loaded from a shared library.
///
/// The library must export:
///
/// * `credscan_extract(path, side) -> char*`: a JSON object of raw fields, or
///   `{"error": {"kind": "...", "message": "..."}}`.
/// * `credscan_precheck(path, side) -> int`: non-zero when the image looks
///   usable.
/// * `credscan_engine_info() -> char*`: a JSON [`EngineInfo`].
/// * `credscan_free_string(char*)`: releases strings returned above.
///
/// `side` is `"front"` or `"back"`. Exports are called from several worker
/// threads at once and must be thread-safe.
pub struct NativeEngine {
    lib_path: PathBuf,
    extract_fn: ExtractFn,
    precheck_fn: PrecheckFn,
    engine_info_fn: EngineInfoFn,
    free_string_fn: FreeStringFn,
    // Must outlive the function pointers above.
    _library: Library,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("lib_path", &self.lib_path)
            .finish_non_exhaustive()
    }
}

impl NativeEngine {
    /// Platform file name of the engine library, e.g. `libcredscan_engine.so`.
    pub fn library_name() -> String {
        format!("{DLL_PREFIX}credscan_engine{DLL_SUFFIX}")
    }

    fn resolve_lib_path<P: AsRef<Path>>(path: P) -> Result<PathBuf, EngineError> {
        let mut lib_path = path.as_ref().to_path_buf();
        if lib_path.is_dir() {
            lib_path.push(Self::library_name());
        }

        std::fs::canonicalize(&lib_path)
            .map_err(|source| EngineError::CanonicalizeLibraryPath { path: lib_path, source })
    }

    /// Load the engine from a library file, or from a directory containing
    /// [`NativeEngine::library_name`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let lib_path = Self::resolve_lib_path(path)?;
        info!(path = %lib_path.display(), "loading recognition engine library");

        // SAFETY: loading runs the library's initialisers; the engine library
        // is trusted code supplied by the host.
        let library = unsafe { Library::new(&lib_path) }.map_err(|source| {
            EngineError::LoadLibrary {
                path: lib_path.clone(),
                source,
            }
        })?;

        // SAFETY: the declared signatures match the exported C ABI above.
        let (extract_fn, precheck_fn, engine_info_fn, free_string_fn) = unsafe {
            (
                load_symbol::<ExtractFn>(&library, "credscan_extract")?,
                load_symbol::<PrecheckFn>(&library, "credscan_precheck")?,
                load_symbol::<EngineInfoFn>(&library, "credscan_engine_info")?,
                load_symbol::<FreeStringFn>(&library, "credscan_free_string")?,
            )
        };

        Ok(Self {
            lib_path,
            extract_fn,
            precheck_fn,
            engine_info_fn,
            free_string_fn,
            _library: library,
        })
    }

    pub fn lib_path(&self) -> &Path {
        &self.lib_path
    }

    /// Copy an engine-owned string and hand the allocation back.
    ///
    /// # Safety
    /// `ptr` must be null or a NUL-terminated string returned by this library.
    unsafe fn take_string(&self, ptr: *mut c_char) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned();
        unsafe { (self.free_string_fn)(ptr) };
        Some(text)
    }
}

impl RecognitionEngine for NativeEngine {
    fn extract(&self, image_path: &Path, side: DocumentSide) -> Result<RawFields, EngineError> {
        let path = c_path(image_path)?;
        // SAFETY: both arguments are NUL-terminated and outlive the call.
        let reply = unsafe {
            let ptr = (self.extract_fn)(path.as_ptr(), side_name(side).as_ptr());
            self.take_string(ptr)
        };
        let reply = reply.ok_or_else(|| EngineError::ProcessingFailed {
            message: "engine returned no reply".to_owned(),
        })?;
        parse_extract_reply(&reply)
    }

    fn precheck(&self, image_path: &Path, side: DocumentSide) -> bool {
        let Ok(path) = c_path(image_path) else {
            return false;
        };
        // SAFETY: both arguments are NUL-terminated and outlive the call.
        unsafe { (self.precheck_fn)(path.as_ptr(), side_name(side).as_ptr()) != 0 }
    }

    fn engine_info(&self) -> EngineInfo {
        // SAFETY: no arguments; the returned string is released by take_string.
        let reply = unsafe {
            let ptr = (self.engine_info_fn)();
            self.take_string(ptr)
        };
        match reply.as_deref().map(serde_json::from_str::<EngineInfo>) {
            Some(Ok(info)) => info,
            Some(Err(e)) => {
                warn!(error = %e, "engine info is not valid JSON");
                self.fallback_info()
            }
            None => self.fallback_info(),
        }
    }
}

impl NativeEngine {
    fn fallback_info(&self) -> EngineInfo {
        let name = self
            .lib_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "native".to_owned());
        EngineInfo::new(name, "")
    }
}

/// # Safety
/// `T` must match the exported symbol's real type.
unsafe fn load_symbol<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, EngineError> {
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|s| *s)
        .map_err(|source| EngineError::MissingSymbol { symbol, source })
}

fn c_path(path: &Path) -> Result<CString, EngineError> {
    let text = path.to_str().ok_or_else(|| EngineError::InvalidImage {
        message: format!("path is not valid UTF-8: {}", path.display()),
    })?;
    CString::new(text).map_err(|_| EngineError::InvalidImage {
        message: format!("path contains a NUL byte: {}", path.display()),
    })
}

fn side_name(side: DocumentSide) -> &'static CStr {
    match side {
        DocumentSide::Front => c"front",
        DocumentSide::Back => c"back",
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportedError {
    kind: Value,
    message: String,
}

/// Interpret the text returned by `credscan_extract`.
fn parse_extract_reply(text: &str) -> Result<RawFields, EngineError> {
    let value: Value = serde_json::from_str(text).map_err(|e| EngineError::ProcessingFailed {
        message: format!("engine reply is not JSON: {e}"),
    })?;
    let Value::Object(object) = value else {
        return Err(EngineError::ProcessingFailed {
            message: "engine reply is not a JSON object".to_owned(),
        });
    };

    match object.get("error") {
        None | Some(Value::Null) => Ok(RawFields::from_json_object(&object)),
        Some(Value::String(message)) => Err(EngineError::reported(ErrorKind::Unknown, message)),
        Some(error) => {
            let reported: ReportedError =
                serde_json::from_value(error.clone()).unwrap_or_default();
            let kind = match &reported.kind {
                Value::String(name) => name.parse().unwrap_or(ErrorKind::Unknown),
                Value::Number(code) => code
                    .as_i64()
                    .and_then(|c| i32::try_from(c).ok())
                    .map(ErrorKind::from_code)
                    .unwrap_or(ErrorKind::Unknown),
                _ => ErrorKind::Unknown,
            };
            Err(EngineError::reported(kind, reported.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn library_name_uses_platform_affixes() {
        let name = NativeEngine::library_name();
        assert!(name.starts_with(DLL_PREFIX));
        assert!(name.ends_with(DLL_SUFFIX));
        assert!(name.contains("credscan_engine"));
    }

    #[test]
    fn missing_library_fails_to_resolve() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = NativeEngine::from_path(dir.path()).expect_err("no library in dir");
        assert!(matches!(err, EngineError::CanonicalizeLibraryPath { .. }));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn non_library_file_fails_to_load() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"definitely not a shared object").expect("write");
        let err = NativeEngine::from_path(file.path()).expect_err("garbage library");
        assert!(matches!(err, EngineError::LoadLibrary { .. }));
    }

    #[test]
    fn reply_fields_become_raw_fields() {
        let raw = parse_extract_reply(
            r#"{"fullName":"JUAN PEREZ","section":"1234","mrz":{"name":"PEREZ<<JUAN"}}"#,
        )
        .expect("fields");
        assert_eq!(raw.get("fullName"), "JUAN PEREZ");
        assert_eq!(raw.get("mrzName"), "PEREZ<<JUAN");
    }

    #[test]
    fn reported_error_object_is_mapped() {
        let err = parse_extract_reply(
            r#"{"error":{"kind":"invalid_image","message":"blurred"}}"#,
        )
        .expect_err("error reply");
        assert_eq!(err.kind(), ErrorKind::InvalidImage);
        assert!(err.to_string().contains("blurred"));

        let err = parse_extract_reply(r#"{"error":{"kind":1003,"message":"no text"}}"#)
            .expect_err("error code reply");
        assert_eq!(err.kind(), ErrorKind::ProcessingFailed);

        let err = parse_extract_reply(r#"{"error":"segfault averted"}"#).expect_err("string error");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn malformed_reply_is_a_processing_failure() {
        for text in ["", "not json", "[1,2]"] {
            let err = parse_extract_reply(text).expect_err("malformed");
            assert_eq!(err.kind(), ErrorKind::ProcessingFailed, "{text:?}");
        }
    }
}
