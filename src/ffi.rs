//! C-compatible FFI API for embedding the certificate service.
//!
//! # ABI Contract
//!
//! All exported functions use the `extern "C"` calling convention and
//! `#[no_mangle]` symbol names. Requests and results cross the boundary as
//! null-terminated UTF-8 JSON.
//!
//! ## Memory management
//! - Strings written to `out_json` are allocated on the Rust heap and
//!   **must** be released with `certforge_free_string`.
//! - Passing a null pointer to `certforge_free_string` is a no-op.
//!
//! ## Error handling
//! - Functions return a `c_int`: `0` success, `1` null argument, `2` bad
//!   input (UTF-8, JSON, config), `3` the render itself failed.
//! - `certforge_last_error` returns a JSON `{"kind": ..., "message": ...}`
//!   describing the last failure on the calling thread.
//!
//! ## Threading
//! Calls block the calling thread on a shared multi-threaded tokio runtime
//! and may be made from several threads at once.
//!
//! ## Usage from C
//! ```c
//! char *out = NULL;
//! if (certforge_render_json("{\"name\":\"Jane Doe\",...}", NULL, &out) == 0) {
//!     puts(out);
//!     certforge_free_string(out);
//! } else {
//!     puts(certforge_last_error());
//! }
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

use serde::Serialize;
use tokio::runtime::Runtime;

use crate::config::ServiceConfig;
use crate::error::{ErrorKind, ErrorReport, RenderError};
use crate::pipeline::CertificateService;
use crate::record::CertificateRequest;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn set_last_error(report: &ErrorReport) {
    let json = serde_json::to_string(report).unwrap_or_else(|_| report.message.clone());
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(json).ok();
    });
}

fn fail(kind: ErrorKind, message: impl Into<String>, code: c_int) -> c_int {
    set_last_error(&ErrorReport {
        kind,
        message: message.into(),
    });
    code
}

fn runtime() -> Result<&'static Runtime, String> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("could not start runtime: {e}"))?;
    Ok(RUNTIME.get_or_init(|| rt))
}

/// # Safety
/// `s`, if non-null, must be a valid null-terminated string.
unsafe fn optional_str<'a>(s: *const c_char) -> Result<Option<&'a str>, String> {
    if s.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(s)
        .to_str()
        .map(Some)
        .map_err(|e| format!("Invalid UTF-8: {e}"))
}

/// `config_path` → loaded configuration (defaults plus environment).
fn load_config(config_path: Option<&str>) -> Result<ServiceConfig, RenderError> {
    ServiceConfig::load(config_path.map(Path::new))
}

/// # Safety
/// `out_json` must be a valid pointer.
unsafe fn write_json<T: Serialize>(value: &T, out_json: *mut *mut c_char) -> c_int {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => return fail(ErrorKind::Io, format!("serializing result: {e}"), 3),
    };
    match CString::new(json) {
        Ok(cs) => {
            *out_json = cs.into_raw();
            0
        }
        Err(_) => fail(ErrorKind::Io, "JSON contained null byte", 3),
    }
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Render one certificate.
///
/// # Parameters
/// - `request_json`: `{"name", "domain", "start_date", "end_date", "gender"}`
/// - `config_path`: optional JSON config file; `NULL` for defaults
/// - `out_json`: on success, receives the rendered artifact as JSON
///   (`path`, `backend`, `content_type`, `download_name`, `attempts`, ...)
///
/// # Safety
/// - `request_json` and `config_path` (if non-null) must be valid
///   null-terminated strings.
/// - `out_json` must be a valid pointer; free `*out_json` with
///   `certforge_free_string`.
#[no_mangle]
pub unsafe extern "C" fn certforge_render_json(
    request_json: *const c_char,
    config_path: *const c_char,
    out_json: *mut *mut c_char,
) -> c_int {
    if request_json.is_null() || out_json.is_null() {
        return fail(ErrorKind::InvalidRequest, "Null pointer argument", 1);
    }
    *out_json = ptr::null_mut();

    let request = match optional_str(request_json) {
        Ok(Some(s)) => s,
        Ok(None) => return fail(ErrorKind::InvalidRequest, "Null pointer argument", 1),
        Err(e) => return fail(ErrorKind::InvalidRequest, e, 2),
    };
    let request: CertificateRequest = match serde_json::from_str(request) {
        Ok(r) => r,
        Err(e) => return fail(ErrorKind::InvalidRequest, format!("Invalid request JSON: {e}"), 2),
    };
    if let Err(e) = request.validate() {
        set_last_error(&e.report());
        return 2;
    }

    let config = match optional_str(config_path) {
        Ok(path) => load_config(path),
        Err(e) => return fail(ErrorKind::Config, e, 2),
    };
    let service = match config.and_then(|c| CertificateService::from_config(&c)) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&e.report());
            return 2;
        }
    };
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => return fail(ErrorKind::Io, e, 3),
    };

    match rt.block_on(service.render(&request)) {
        Ok(artifact) => write_json(&artifact, out_json),
        Err(e) => {
            set_last_error(&e.report());
            3
        }
    }
}

/// Report template presence and backend availability as JSON.
///
/// # Safety
/// `config_path` (if non-null) must be a valid null-terminated string;
/// `out_json` must be a valid pointer. Free `*out_json` with
/// `certforge_free_string`.
#[no_mangle]
pub unsafe extern "C" fn certforge_health_json(
    config_path: *const c_char,
    out_json: *mut *mut c_char,
) -> c_int {
    if out_json.is_null() {
        return fail(ErrorKind::InvalidRequest, "Null pointer argument", 1);
    }
    *out_json = ptr::null_mut();

    let config = match optional_str(config_path) {
        Ok(path) => load_config(path),
        Err(e) => return fail(ErrorKind::Config, e, 2),
    };
    let service = match config.and_then(|c| CertificateService::from_config(&c)) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&e.report());
            return 2;
        }
    };
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => return fail(ErrorKind::Io, e, 3),
    };
    let report = rt.block_on(service.health());
    write_json(&report, out_json)
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a string returned through an `out_json` parameter.
///
/// # Safety
/// `s` must have been returned by this library (via `CString::into_raw`).
#[no_mangle]
pub unsafe extern "C" fn certforge_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Last error on this thread as a JSON string, or null if none.
///
/// The pointer stays valid until the next failing `certforge_*` call on the
/// same thread. Do **not** free it.
#[no_mangle]
pub extern "C" fn certforge_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_error() -> serde_json::Value {
        let p = certforge_last_error();
        assert!(!p.is_null());
        let s = unsafe { CStr::from_ptr(p) }.to_str().unwrap();
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn null_request_is_rejected() {
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { certforge_render_json(ptr::null(), ptr::null(), &mut out) };
        assert_eq!(rc, 1);
        assert!(out.is_null());
        assert_eq!(last_error()["kind"], "invalid_request");
    }

    #[test]
    fn malformed_request_reports_invalid_request() {
        let mut out: *mut c_char = ptr::null_mut();

        let req = CString::new(r#"{"name": "Jane""#).unwrap();
        let rc = unsafe { certforge_render_json(req.as_ptr(), ptr::null(), &mut out) };
        assert_eq!(rc, 2);
        assert_eq!(last_error()["kind"], "invalid_request");

        let latin1 = CString::new(b"{\"name\":\"Jos\xe9\"}".to_vec()).unwrap();
        let rc = unsafe { certforge_render_json(latin1.as_ptr(), ptr::null(), &mut out) };
        assert_eq!(rc, 2);
        assert_eq!(last_error()["kind"], "invalid_request");
        assert!(out.is_null());
    }

    #[test]
    fn blank_name_reports_missing_field() {
        let req = CString::new(
            r#"{"name":" ","domain":"Data","start_date":"a","end_date":"b"}"#,
        )
        .unwrap();
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { certforge_render_json(req.as_ptr(), ptr::null(), &mut out) };
        assert_eq!(rc, 2);
        assert_eq!(last_error()["kind"], "missing_field");
    }

    #[test]
    fn render_and_health_through_the_abi() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.html");
        std::fs::write(&template, "<p>Awarded to {{Name}}</p>").unwrap();
        let config_path = dir.path().join("config.json");
        let config = serde_json::json!({
            "template_path": template,
            "work_dir": dir.path().join("work"),
            "backend_order": ["native", "synthetic"],
        });
        std::fs::write(&config_path, config.to_string()).unwrap();
        let config_c = CString::new(config_path.to_str().unwrap()).unwrap();

        let req = CString::new(
            r#"{"name":"Jane Doe","domain":"Data","start_date":"a","end_date":"b","gender":"female"}"#,
        )
        .unwrap();
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { certforge_render_json(req.as_ptr(), config_c.as_ptr(), &mut out) };
        assert_eq!(rc, 0);
        let json: serde_json::Value =
            serde_json::from_str(unsafe { CStr::from_ptr(out) }.to_str().unwrap()).unwrap();
        assert_eq!(json["backend"], "native");
        assert_eq!(json["download_name"], "certificate_Jane_Doe.pdf");
        assert!(Path::new(json["path"].as_str().unwrap()).exists());
        unsafe { certforge_free_string(out) };

        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { certforge_health_json(config_c.as_ptr(), &mut out) };
        assert_eq!(rc, 0);
        let json: serde_json::Value =
            serde_json::from_str(unsafe { CStr::from_ptr(out) }.to_str().unwrap()).unwrap();
        assert_eq!(json["status"], "healthy");
        unsafe { certforge_free_string(out) };
    }
}
