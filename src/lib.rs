//! # Review Vault Core
//!
//! Offline-first storage core for a customer review widget. The host UI
//! (browser shell, Flutter, desktop) collects the form and renders the list;
//! this library validates submissions, suppresses near-duplicates, enforces a
//! submission interval and persists reviews through an ordered chain of
//! storage tiers:
//!
//! 1. an optional remote blob store reached over HTTP,
//! 2. a durable local store backed by LMDB,
//! 3. a session-scoped store,
//! 4. an in-memory list that lives as long as the store handle.
//!
//! Reads walk the same chain and return the first non-empty collection,
//! newest first.
//!
//! ## Quick Start
//!
//! ```no_run
//! use review_vault_core::{create_review_store, submit_review, get_reviews};
//! use std::ffi::CString;
//!
//! let config = CString::new(r#"{"db_path":"shop_reviews"}"#).unwrap();
//! let store = create_review_store(config.as_ptr());
//!
//! let form = CString::new(
//!     r#"{"name":"Ana","rating":5,"content":"Great service, very punctual!"}"#,
//! ).unwrap();
//! let result = submit_review(store, form.as_ptr());
//! let reviews = get_reviews(store);
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_review_store`] - Open a store from a JSON configuration
//! - [`submit_review`] - Validate and persist a form submission
//! - [`get_reviews`] - Newest reviews, capped for display
//! - [`get_all_reviews`] - Every reachable review
//! - [`export_reviews`] - JSON export of the local collection
//! - [`restore_review_backup`] - Restore the local collection from its backup
//! - [`clear_all_reviews`] - Drop every locally held review
//! - [`current_notice`] - Live transient notification, if any
//! - [`close_review_store`] - Close and free a store
//! - [`free_response`] - Free a string returned by this library

pub mod app_response;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod eviction;
pub mod export;
pub mod notice;
pub mod orchestrator;
pub mod rate_limit;
pub mod reconciler;
pub mod retry;
pub mod review_model;
pub mod service;
pub mod tiers;
pub mod validation;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use chrono::Utc;
use log::{info, warn};

use crate::app_response::AppResponse;
use crate::config::ReviewConfig;
use crate::review_model::ReviewSubmission;
use crate::service::ReviewService;

/// Opens a review store.
///
/// # Parameters
///
/// * `config_json` - Null-terminated JSON [`ReviewConfig`]. A null pointer
///   reads the configuration from `REVIEWS_*` environment variables.
///
/// # Returns
///
/// A pointer to the [`ReviewService`], or null when the configuration is not
/// valid UTF-8 or not valid JSON. Release it with [`close_review_store`].
///
/// # Safety
///
/// `config_json` must be null or point to a null-terminated string that stays
/// valid for the duration of the call. The returned pointer must be released
/// exactly once with [`close_review_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_review_store(config_json: *const c_char) -> *mut ReviewService {
    let config = if config_json.is_null() {
        info!("No configuration passed, reading REVIEWS_* environment");
        ReviewConfig::from_env()
    } else {
        let raw = match unsafe { CStr::from_ptr(config_json).to_str() } {
            Ok(s) => s,
            Err(e) => {
                warn!("Invalid UTF-8 in configuration: {e}");
                return std::ptr::null_mut();
            }
        };
        match ReviewConfig::from_json(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid review store configuration: {e}");
                return std::ptr::null_mut();
            }
        }
    };

    info!("Opening review store at {}.lmdb", config.db_path);
    Box::into_raw(Box::new(ReviewService::open(config)))
}

/// Validates and persists a form submission.
///
/// Expected JSON, with field names fixed by the form contract:
///
/// ```json
/// {
///   "name": "Ana",
///   "email": "ana@example.com",
///   "location": "Lisbon",
///   "vehicle_rented": "Compact",
///   "rating": 5,
///   "content": "Great service, very punctual!"
/// }
/// ```
///
/// Returns `Ok` with the stored record, or one of `ValidationError`,
/// `Duplicate`, `RateLimited`, `DatabaseError` with a message meant for the
/// submitter.
///
/// # Safety
///
/// This function is unsafe because it dereferences raw pointers. `state` must
/// come from [`create_review_store`] and `json_ptr` must be a valid
/// null-terminated string. The returned string must be freed with
/// [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn submit_review(state: *mut ReviewService, json_ptr: *const c_char) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => {
            let error = AppResponse::BadRequest("Null state pointer".to_string());
            return response_to_c_string(&error);
        }
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let submission: ReviewSubmission = match serde_json::from_str(&json_str) {
        Ok(s) => s,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match state.submit(submission) {
        Ok(record) => json_response(&record),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Returns the newest reviews, capped at the configured display limit.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_review_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_reviews(state: *mut ReviewService) -> *const c_char {
    match unsafe { state.as_ref() } {
        Some(state) => json_response(&state.reviews()),
        None => null_state("get_reviews"),
    }
}

/// Returns every reachable review, newest first.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_review_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all_reviews(state: *mut ReviewService) -> *const c_char {
    match unsafe { state.as_ref() } {
        Some(state) => json_response(&state.all_reviews()),
        None => null_state("get_all_reviews"),
    }
}

/// Serializes the local collection as a downloadable document named after
/// today's date: `{"file_name": "...", "contents": "..."}`.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_review_store`]. The
/// returned string must be freed with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_reviews(state: *mut ReviewService) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state("export_reviews"),
    };

    match state.export(Utc::now().date_naive()) {
        Ok(document) => json_response(&document),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Replaces the local collection with its backup copy.
///
/// # Safety
///
/// The state parameter must be a valid pointer.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn restore_review_backup(state: *mut ReviewService) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state("restore_review_backup"),
    };

    match state.restore_backup() {
        Ok(count) => response_to_c_string(&AppResponse::success(format!("Restored {count} reviews from backup"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Removes every locally held review. The remote collection is untouched.
///
/// # Safety
///
/// The state parameter must be a valid pointer.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_reviews(state: *mut ReviewService) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state("clear_all_reviews"),
    };

    match state.clear_all() {
        Ok(()) => response_to_c_string(&AppResponse::success("All reviews cleared successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Returns the live notification, or `NotFound` when none is showing.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_review_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn current_notice(state: *mut ReviewService) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state("current_notice"),
    };

    match state.current_notice() {
        Some(notice) => json_response(&notice),
        None => response_to_c_string(&AppResponse::NotFound("No notice showing".to_string())),
    }
}

/// Closes the durable store and frees the handle. The pointer must not be
/// used afterwards.
///
/// # Safety
///
/// This function is unsafe because it takes ownership of `state` and drops
/// it. Passing the same pointer twice, or one not returned by
/// [`create_review_store`], is undefined behavior.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_review_store(state: *mut ReviewService) -> *const c_char {
    if state.is_null() {
        return null_state("close_review_store");
    }

    let state = unsafe { Box::from_raw(state) };
    match state.close() {
        Ok(()) => response_to_c_string(&AppResponse::success("Review store closed successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Frees a string returned by any function of this library.
///
/// # Safety
///
/// `ptr` must be null or a string returned by this library that has not been
/// freed yet.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr as *mut c_char) });
    }
}

fn null_state(function: &str) -> *const c_char {
    let error = AppResponse::BadRequest(format!("Null state pointer passed to {function}"));
    response_to_c_string(&error)
}

/// Wraps a serializable payload in an `Ok` response.
fn json_response<T: serde::Serialize + ?Sized>(payload: &T) -> *const c_char {
    match serde_json::to_string(payload) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Converts an [`AppResponse`] to a C string owned by the caller.
///
/// Returns null if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String, reporting null pointers and
/// invalid UTF-8 as a `BadRequest` response.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
