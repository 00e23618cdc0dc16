//! Stable C ABI. This module is the crate's only `unsafe` surface; every
//! other module is safe Rust working on owned or borrowed slices.
//!
//! Validates at the boundary, converts to/from plain data, and never lets
//! a Rust panic cross into the caller.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::c_char;
use std::panic;
use std::ptr;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::config::{Config, ContentType, Profile};
use crate::engine::{self, AlignmentOutcome, BatchTarget, EngineHandle};
use crate::error::{AlignError, ErrorKind};
use crate::method::Method;
use crate::quality;

/// Size of `CAlignResult::method`'s fixed buffer, matching the longest
/// method name (`Method::name` is asserted `< 32` bytes) plus a NUL.
const METHOD_NAME_LEN: usize = 32;

/// Copy `name`'s ASCII bytes into a fixed `[c_char; 32]` buffer, truncated
/// to `METHOD_NAME_LEN - 1` bytes and NUL-padded. Used directly as
/// `CAlignResult::method` so the ABI struct is self-contained and callers
/// never need a separate name-lookup call.
fn method_name_buf(name: &str) -> [c_char; METHOD_NAME_LEN] {
    let mut buf = [0 as c_char; METHOD_NAME_LEN];
    for (dst, &b) in buf.iter_mut().zip(name.as_bytes().iter().take(METHOD_NAME_LEN - 1)) {
        *dst = b as c_char;
    }
    buf
}

/// Plain-data mirror of [`crate::config::Config`]'s ABI-facing primary
/// knobs. Extended tuning fields stay Rust-only.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CConfig {
    pub confidence_threshold: f64,
    pub window_size: i32,
    pub hop_size: i32,
    pub noise_gate_db: f64,
    pub max_offset_samples: i64,
    pub enable_drift_correction: i32,
}

impl From<&Config> for CConfig {
    fn from(c: &Config) -> Self {
        CConfig {
            confidence_threshold: c.confidence_threshold,
            window_size: c.window_size,
            hop_size: c.hop_size,
            noise_gate_db: c.noise_gate_db,
            max_offset_samples: c.max_offset_samples,
            enable_drift_correction: c.enable_drift_correction as i32,
        }
    }
}

impl From<CConfig> for Config {
    fn from(c: CConfig) -> Self {
        let mut cfg = Config::default();
        cfg.confidence_threshold = c.confidence_threshold;
        cfg.window_size = c.window_size;
        cfg.hop_size = c.hop_size;
        cfg.noise_gate_db = c.noise_gate_db;
        cfg.max_offset_samples = c.max_offset_samples;
        cfg.enable_drift_correction = c.enable_drift_correction != 0;
        cfg
    }
}

/// Result of a single alignment call. `error_kind` is `0` (Success) iff
/// `success != 0`; all quality fields are `0.0` on failure. `method` is a
/// NUL-terminated ASCII name, embedded directly rather than requiring a
/// separate `audiosync_method_name` lookup, so the struct is bit-exact and
/// self-contained.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CAlignResult {
    pub success: i32,
    pub error_kind: i32,
    pub offset_samples: i64,
    pub confidence: f64,
    pub method: [c_char; METHOD_NAME_LEN],
    pub peak_correlation: f64,
    pub snr_db: f64,
    pub noise_floor_db: f64,
    pub secondary_peak_ratio: f64,
}

impl CAlignResult {
    fn from_outcome(outcome: AlignmentOutcome) -> Self {
        CAlignResult {
            success: 1,
            error_kind: ErrorKind::Success as i32,
            offset_samples: outcome.offset_samples,
            confidence: outcome.confidence,
            method: method_name_buf(outcome.method.name()),
            peak_correlation: outcome.peak_correlation,
            snr_db: outcome.snr_db,
            noise_floor_db: outcome.noise_floor_db,
            secondary_peak_ratio: outcome.secondary_peak_ratio,
        }
    }

    fn from_error(err: &AlignError) -> Self {
        CAlignResult {
            success: 0,
            error_kind: err.kind() as i32,
            offset_samples: 0,
            confidence: 0.0,
            method: [0; METHOD_NAME_LEN],
            peak_correlation: 0.0,
            snr_db: 0.0,
            noise_floor_db: 0.0,
            secondary_peak_ratio: 0.0,
        }
    }

    fn panic() -> Self {
        CAlignResult {
            success: 0,
            error_kind: ErrorKind::ProcessingFailed as i32,
            offset_samples: 0,
            confidence: 0.0,
            method: [0; METHOD_NAME_LEN],
            peak_correlation: 0.0,
            snr_db: 0.0,
            noise_floor_db: 0.0,
            secondary_peak_ratio: 0.0,
        }
    }
}

/// Heap-allocated array of per-target results; free with
/// [`audiosync_free_batch_result`]. A batch-level failure (OOM, an empty
/// `target_count`, or a caught panic across the whole call) sets `error` to
/// the relevant `ErrorKind` and leaves `results` null and `count` zero
/// instead of allocating a same-length array of per-target errors.
#[repr(C)]
pub struct CBatchResult {
    pub results: *mut CAlignResult,
    pub count: usize,
    pub error: i32,
}

/// One target buffer in a batch call.
#[repr(C)]
pub struct CTargetBuffer {
    pub samples: *const f32,
    pub len: usize,
    pub sample_rate: u32,
}

/// Opaque cancellation handle shared between a caller and an in-progress
/// alignment call.
pub struct CancelHandle(CancelToken);

#[no_mangle]
pub extern "C" fn audiosync_create_cancel_token() -> *mut CancelHandle {
    Box::into_raw(Box::new(CancelHandle(CancelToken::new())))
}

/// # Safety
/// `token` must be a live pointer from `audiosync_create_cancel_token`, or null.
#[no_mangle]
pub unsafe extern "C" fn audiosync_cancel(token: *const CancelHandle) {
    if !token.is_null() {
        (*token).0.cancel();
    }
}

/// # Safety
/// `token` must be a pointer returned by `audiosync_create_cancel_token`, not
/// already destroyed, and not used afterward. A no-op on null.
#[no_mangle]
pub unsafe extern "C" fn audiosync_destroy_cancel_token(token: *mut CancelHandle) {
    if !token.is_null() {
        drop(Box::from_raw(token));
    }
}

/// Borrow a [`CancelToken`] from an optional handle pointer: a fresh,
/// never-cancelled token if null, a clone of the shared token otherwise.
unsafe fn token_from_handle(handle: *const CancelHandle) -> CancelToken {
    if handle.is_null() {
        CancelToken::new()
    } else {
        (*handle).0.clone()
    }
}

fn catch_align<F: FnOnce() -> Result<AlignmentOutcome, AlignError> + panic::UnwindSafe>(f: F) -> CAlignResult {
    match panic::catch_unwind(f) {
        Ok(Ok(outcome)) => CAlignResult::from_outcome(outcome),
        Ok(Err(err)) => CAlignResult::from_error(&err),
        Err(_) => CAlignResult::panic(),
    }
}

/// # Safety
/// `reference`/`target` must point to at least `reference_len`/`target_len`
/// valid, initialized `f32` samples, `config` (if non-null) to a valid
/// `CConfig`, and `cancel` (if non-null) to a live `CancelHandle`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_align(
    reference: *const f32,
    reference_len: usize,
    reference_sample_rate: u32,
    target: *const f32,
    target_len: usize,
    target_sample_rate: u32,
    method: i32,
    config: *const CConfig,
    cancel: *const CancelHandle,
) -> CAlignResult {
    if reference.is_null() || target.is_null() {
        return CAlignResult::from_error(&AlignError::InvalidInput("null buffer pointer".into()));
    }
    let Some(method) = Method::from_i32(method) else {
        return CAlignResult::from_error(&AlignError::InvalidInput("unknown method code".into()));
    };
    let cfg = if config.is_null() {
        Config::default()
    } else {
        Config::from(*config)
    };
    let cancel = token_from_handle(cancel);

    let reference = std::slice::from_raw_parts(reference, reference_len);
    let target = std::slice::from_raw_parts(target, target_len);

    catch_align(panic::AssertUnwindSafe(move || {
        engine::align(reference, reference_sample_rate, target, target_sample_rate, method, &cfg, &cancel)
    }))
}

/// # Safety
/// `reference` must point to `reference_len` valid `f32` samples; `targets`
/// to `target_count` valid [`CTargetBuffer`]s, each with a valid `samples`
/// pointer; `config` (if non-null) to a valid `CConfig`; `cancel` (if
/// non-null) to a live `CancelHandle`, shared across the whole batch. The
/// returned `CBatchResult.results`, if non-null, must be released with
/// [`audiosync_free_batch_result`].
#[no_mangle]
pub unsafe extern "C" fn audiosync_align_batch(
    reference: *const f32,
    reference_len: usize,
    reference_sample_rate: u32,
    targets: *const CTargetBuffer,
    target_count: usize,
    method: i32,
    config: *const CConfig,
    cancel: *const CancelHandle,
) -> CBatchResult {
    if target_count == 0 {
        return empty_batch_result(ErrorKind::InvalidInput);
    }
    if reference.is_null() || targets.is_null() {
        return empty_batch_result(ErrorKind::InvalidInput);
    }
    let Some(method) = Method::from_i32(method) else {
        return empty_batch_result(ErrorKind::InvalidInput);
    };
    let cfg = if config.is_null() {
        Config::default()
    } else {
        Config::from(*config)
    };
    let cancel = token_from_handle(cancel);

    let reference = std::slice::from_raw_parts(reference, reference_len);
    let c_targets = std::slice::from_raw_parts(targets, target_count);

    let borrowed: Vec<BatchTarget> = c_targets
        .iter()
        .map(|t| BatchTarget {
            samples: std::slice::from_raw_parts(t.samples, t.len),
            sample_rate: t.sample_rate,
        })
        .collect();

    let results = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        engine::align_batch(reference, reference_sample_rate, &borrowed, method, &cfg, &cancel)
    }));

    match results {
        Ok(results) => {
            let c_results: Vec<CAlignResult> = results
                .into_iter()
                .map(|r| match r {
                    Ok(o) => CAlignResult::from_outcome(o),
                    Err(e) => CAlignResult::from_error(&e),
                })
                .collect();
            leak_results(c_results)
        }
        Err(_) => empty_batch_result(ErrorKind::ProcessingFailed),
    }
}

fn empty_batch_result(error: ErrorKind) -> CBatchResult {
    CBatchResult { results: ptr::null_mut(), count: 0, error: error as i32 }
}

fn leak_results(results: Vec<CAlignResult>) -> CBatchResult {
    let mut boxed = results.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    let count = boxed.len();
    std::mem::forget(boxed);
    CBatchResult { results: ptr, count, error: ErrorKind::Success as i32 }
}

/// Free a [`CBatchResult`] previously returned by
/// [`audiosync_align_batch`]. A no-op on a zeroed/null result.
///
/// # Safety
/// `batch.results`/`batch.count` must be exactly as returned by
/// `audiosync_align_batch`, and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn audiosync_free_batch_result(batch: CBatchResult) {
    if batch.results.is_null() {
        return;
    }
    drop(Vec::from_raw_parts(batch.results, batch.count, batch.count));
}

/// A single `CAlignResult` carries no heap allocation; freeing it is a
/// no-op, kept for API symmetry with `audiosync_free_batch_result`.
#[no_mangle]
pub extern "C" fn audiosync_free_result(_result: CAlignResult) {}

#[no_mangle]
pub extern "C" fn audiosync_default_config() -> CConfig {
    CConfig::from(&Config::default())
}

fn profile_from_i32(v: i32) -> Option<Profile> {
    match v {
        0 => Some(Profile::Fast),
        1 => Some(Profile::Balanced),
        2 => Some(Profile::Accurate),
        3 => Some(Profile::HighQuality),
        4 => Some(Profile::LowResource),
        5 => Some(Profile::Custom),
        _ => None,
    }
}

fn content_type_from_i32(v: i32) -> Option<ContentType> {
    match v {
        0 => Some(ContentType::Music),
        1 => Some(ContentType::Speech),
        2 => Some(ContentType::Ambient),
        3 => Some(ContentType::Broadcast),
        4 => Some(ContentType::Podcast),
        5 => Some(ContentType::MultiCam),
        6 => Some(ContentType::General),
        _ => None,
    }
}

#[no_mangle]
pub extern "C" fn audiosync_config_for_use_case(profile: i32, content_type: i32) -> CConfig {
    let mut cfg = Config::default();
    if let Some(p) = profile_from_i32(profile) {
        cfg = cfg.with_profile(p);
    }
    if let Some(c) = content_type_from_i32(content_type) {
        cfg = cfg.for_content_type(c);
    }
    CConfig::from(&cfg)
}

/// Returns `0` (success) or the `ErrorKind` code of the first violated
/// constraint.
///
/// # Safety
/// `config` must point to a valid `CConfig`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_validate_config(config: *const CConfig) -> i32 {
    if config.is_null() {
        return ErrorKind::InvalidInput as i32;
    }
    let cfg = Config::from(*config);
    match cfg.validate() {
        Ok(()) => ErrorKind::Success as i32,
        Err(e) => e.kind() as i32,
    }
}

#[no_mangle]
pub extern "C" fn audiosync_min_audio_length(method: i32, sample_rate: u32) -> u64 {
    match Method::from_i32(method) {
        Some(m) => m.min_samples(sample_rate) as u64,
        None => 0,
    }
}

#[no_mangle]
pub extern "C" fn audiosync_estimate_processing_time(
    duration_s: f64,
    method: i32,
    window_size: i32,
    hop_size: i32,
) -> f64 {
    match Method::from_i32(method) {
        Some(m) => quality::estimate_processing_time_s(duration_s, m, window_size, hop_size),
        None => 0.0,
    }
}

static STRING_CACHE: Lazy<Mutex<HashMap<&'static str, CString>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn cached_cstr(s: &'static str) -> *const c_char {
    let mut cache = STRING_CACHE.lock();
    let entry = cache
        .entry(s)
        .or_insert_with(|| CString::new(s).expect("static strings never contain NUL"));
    entry.as_ptr()
}

/// Returns a pointer to a process-wide static string; callers must not free it.
#[no_mangle]
pub extern "C" fn audiosync_error_description(kind: i32) -> *const c_char {
    match kind {
        0 => cached_cstr(ErrorKind::Success.description()),
        1 => cached_cstr(ErrorKind::InvalidInput.description()),
        2 => cached_cstr(ErrorKind::InsufficientData.description()),
        3 => cached_cstr(ErrorKind::ProcessingFailed.description()),
        4 => cached_cstr(ErrorKind::OutOfMemory.description()),
        5 => cached_cstr(ErrorKind::UnsupportedFormat.description()),
        _ => ptr::null(),
    }
}

/// Returns a pointer to a process-wide static string; callers must not free it.
#[no_mangle]
pub extern "C" fn audiosync_method_name(method: i32) -> *const c_char {
    match Method::from_i32(method) {
        Some(m) => cached_cstr(m.name()),
        None => ptr::null(),
    }
}

/// Returns a pointer to a process-wide static string; callers must not free it.
#[no_mangle]
pub extern "C" fn audiosync_version() -> *const c_char {
    cached_cstr(env!("CARGO_PKG_VERSION"))
}

/// Opaque long-lived engine handle.
pub struct Engine(EngineHandle);

/// Returns null on an invalid config.
///
/// # Safety
/// `config` (if non-null) must point to a valid `CConfig`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_create_engine(config: *const CConfig) -> *mut Engine {
    let cfg = if config.is_null() {
        Config::default()
    } else {
        Config::from(*config)
    };
    match EngineHandle::new(cfg) {
        Ok(handle) => Box::into_raw(Box::new(Engine(handle))),
        Err(_) => ptr::null_mut(),
    }
}

/// # Safety
/// `engine` must be a pointer returned by `audiosync_create_engine`, not
/// already destroyed, and not used afterward.
#[no_mangle]
pub unsafe extern "C" fn audiosync_destroy_engine(engine: *mut Engine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// # Safety
/// `engine` must be a live pointer from `audiosync_create_engine`; `config`
/// (if non-null) must point to a valid `CConfig`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_set_engine_config(engine: *mut Engine, config: *const CConfig) -> i32 {
    if engine.is_null() || config.is_null() {
        return ErrorKind::InvalidInput as i32;
    }
    let cfg = Config::from(*config);
    match (*engine).0.set_config(cfg) {
        Ok(()) => ErrorKind::Success as i32,
        Err(e) => e.kind() as i32,
    }
}

/// # Safety
/// `engine` must be a live pointer from `audiosync_create_engine`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_get_engine_config(engine: *const Engine) -> CConfig {
    if engine.is_null() {
        return CConfig::from(&Config::default());
    }
    CConfig::from((*engine).0.config())
}

/// # Safety
/// `engine` must be a live pointer from `audiosync_create_engine`;
/// `reference`/`target` must point to at least `reference_len`/`target_len`
/// valid `f32` samples; `cancel` (if non-null) must point to a live
/// `CancelHandle`.
#[no_mangle]
pub unsafe extern "C" fn audiosync_engine_process(
    engine: *const Engine,
    reference: *const f32,
    reference_len: usize,
    target: *const f32,
    target_len: usize,
    cancel: *const CancelHandle,
) -> CAlignResult {
    if engine.is_null() || reference.is_null() || target.is_null() {
        return CAlignResult::from_error(&AlignError::InvalidInput("null pointer".into()));
    }
    let reference = std::slice::from_raw_parts(reference, reference_len);
    let target = std::slice::from_raw_parts(target, target_len);
    let handle = &(*engine).0;
    let cancel = token_from_handle(cancel);

    catch_align(panic::AssertUnwindSafe(move || handle.process(reference, target, &cancel)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_c_repr() {
        let cfg = Config::default().with_profile(crate::config::Profile::Accurate);
        let c_cfg = CConfig::from(&cfg);
        let back: Config = c_cfg.into();
        assert_eq!(back.window_size, cfg.window_size);
        assert_eq!(back.hop_size, cfg.hop_size);
    }

    #[test]
    fn align_rejects_null_buffers() {
        let result = unsafe {
            audiosync_align(ptr::null(), 0, 44_100, ptr::null(), 0, 44_100, 0, ptr::null(), ptr::null())
        };
        assert_eq!(result.success, 0);
        assert_eq!(result.error_kind, ErrorKind::InvalidInput as i32);
    }

    #[test]
    fn align_result_embeds_method_name() {
        let sr = 44_100u32;
        let samples: Vec<f32> = (0..sr * 3)
            .map(|i| ((i as f64 * 0.02).sin() * 0.5) as f32)
            .collect();
        let result = unsafe {
            audiosync_align(
                samples.as_ptr(), samples.len(), sr,
                samples.as_ptr(), samples.len(), sr,
                Method::Energy as i32, ptr::null(), ptr::null(),
            )
        };
        assert_eq!(result.success, 1);
        let name = unsafe { std::ffi::CStr::from_ptr(result.method.as_ptr()) }.to_str().unwrap();
        assert_eq!(name, Method::Energy.name());
    }

    #[test]
    fn cancel_token_lifecycle() {
        let token = audiosync_create_cancel_token();
        assert!(!token.is_null());
        unsafe { audiosync_cancel(token) };
        unsafe { audiosync_destroy_cancel_token(token) };
    }

    #[test]
    fn align_observes_pre_cancelled_token() {
        let sr = 44_100u32;
        let samples: Vec<f32> = vec![0.0; (sr * 3) as usize];
        let token = audiosync_create_cancel_token();
        unsafe { audiosync_cancel(token) };
        let result = unsafe {
            audiosync_align(
                samples.as_ptr(), samples.len(), sr,
                samples.as_ptr(), samples.len(), sr,
                Method::Energy as i32, ptr::null(), token,
            )
        };
        assert_eq!(result.success, 0);
        assert_eq!(result.error_kind, ErrorKind::ProcessingFailed as i32);
        unsafe { audiosync_destroy_cancel_token(token) };
    }

    #[test]
    fn validate_config_rejects_null() {
        assert_eq!(unsafe { audiosync_validate_config(ptr::null()) }, ErrorKind::InvalidInput as i32);
    }

    #[test]
    fn validate_config_accepts_default() {
        let cfg = audiosync_default_config();
        assert_eq!(unsafe { audiosync_validate_config(&cfg as *const _) }, ErrorKind::Success as i32);
    }

    #[test]
    fn method_name_round_trips() {
        let ptr = audiosync_method_name(Method::Energy as i32);
        assert!(!ptr.is_null());
        let name = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(name, Method::Energy.name());
    }

    #[test]
    fn unknown_method_name_is_null() {
        assert!(audiosync_method_name(999).is_null());
    }

    #[test]
    fn engine_lifecycle_round_trips() {
        let cfg = audiosync_default_config();
        let engine = unsafe { audiosync_create_engine(&cfg as *const _) };
        assert!(!engine.is_null());
        let fetched = unsafe { audiosync_get_engine_config(engine) };
        assert_eq!(fetched.window_size, cfg.window_size);
        unsafe { audiosync_destroy_engine(engine) };
    }

    #[test]
    fn batch_result_can_be_freed() {
        let samples = vec![0.0f32; 2048];
        let targets = vec![CTargetBuffer {
            samples: samples.as_ptr(),
            len: samples.len(),
            sample_rate: 44_100,
        }];
        let batch = unsafe {
            audiosync_align_batch(samples.as_ptr(), samples.len(), 44_100, targets.as_ptr(), 1, Method::Energy as i32, ptr::null(), ptr::null())
        };
        assert_eq!(batch.count, 1);
        assert_eq!(batch.error, ErrorKind::Success as i32);
        unsafe { audiosync_free_batch_result(batch) };
    }

    #[test]
    fn empty_batch_short_circuits_to_null_results() {
        let samples = vec![0.0f32; 2048];
        let batch = unsafe {
            audiosync_align_batch(samples.as_ptr(), samples.len(), 44_100, ptr::null(), 0, Method::Energy as i32, ptr::null(), ptr::null())
        };
        assert!(batch.results.is_null());
        assert_eq!(batch.count, 0);
        assert_eq!(batch.error, ErrorKind::InvalidInput as i32);
        unsafe { audiosync_free_batch_result(batch) };
    }
}
