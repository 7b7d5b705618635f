//! macOS Accessibility API Integration
//!
//! Thin bindings over the AX C API used to read the target's conversation
//! surface. Everything here is blocking and must be called from
//! `spawn_blocking`.
//!
//! Ownership follows the CoreFoundation create rule: every element or value
//! copied out of the API is wrapped so it is released before the call that
//! produced it returns. Elements read out of a children array are borrowed
//! from that array and never outlive it.

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::{CFString, CFStringRef};
use jiffy_domain::{ConversationTurn, Result as DomainResult, TurnRole};

use super::error_helpers::{ax_call_error, ax_permission_error};

#[repr(C)]
struct __AXUIElement(std::ffi::c_void);
type AXUIElementRef = *const __AXUIElement;

extern "C" {
    fn AXIsProcessTrustedWithOptions(options: CFTypeRef) -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementSetAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: CFTypeRef,
    ) -> i32;
    fn CFRelease(cf: CFTypeRef);
}

// AX error codes
const K_AX_ERROR_SUCCESS: i32 = 0;
const K_AX_ERROR_INVALID_UI_ELEMENT: i32 = -25202;
const K_AX_ERROR_CANNOT_COMPLETE: i32 = -25204;
const K_AX_ERROR_ATTRIBUTE_UNSUPPORTED: i32 = -25205;
const K_AX_ERROR_API_DISABLED: i32 = -25211;
const K_AX_ERROR_NO_VALUE: i32 = -25212;

// DOM classes the target renders conversation turns with
const USER_TURN_CLASS: &str = "font-user-message";
const ASSISTANT_TURN_CLASS: &str = "font-claude-message";
const STOP_BUTTON_LABEL: &str = "Stop";

/// Bounds on a single tree walk
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

/// Everything read from the target window in one pass
#[derive(Debug, Clone, Default)]
pub struct WindowScan {
    pub title: Option<String>,
    pub turns: Vec<ConversationTurn>,
    pub composer_length: usize,
    pub generating: bool,
    pub nodes_visited: usize,
}

/// An AX element this module owns a +1 reference to.
struct OwnedElement(AXUIElementRef);

impl OwnedElement {
    /// # Safety
    /// `ptr` must be null or carry a reference obtained under the create rule.
    unsafe fn from_create_rule(ptr: AXUIElementRef) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    const fn as_ptr(&self) -> AXUIElementRef {
        self.0
    }
}

impl Drop for OwnedElement {
    fn drop(&mut self) {
        // SAFETY: constructed only from non-null create-rule references, and
        // released exactly once here.
        unsafe { CFRelease(self.0.cast()) }
    }
}

/// Check if Accessibility permission is granted.
///
/// With `prompt = true` the system consent dialog is shown if the process is
/// not yet trusted. The call returns immediately either way; a grant is only
/// visible on a later check.
pub fn check_ax_permission(prompt: bool) -> bool {
    // SAFETY: AXIsProcessTrustedWithOptions is a C function that:
    // - Accepts a CFDictionary pointer (we create a valid CFDictionary)
    // - Returns a C bool indicating trust status
    // - Does not retain the dictionary after return
    let is_trusted = unsafe {
        let prompt_key = CFString::from_static_string("AXTrustedCheckOptionPrompt");
        let prompt_value = CFBoolean::from(prompt);

        let options =
            CFDictionary::from_CFType_pairs(&[(prompt_key.as_CFType(), prompt_value.as_CFType())]);

        AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef().cast())
    };

    tracing::debug!(is_trusted, prompt, "Checked accessibility trust");
    is_trusted
}

/// Read the conversation surface of the window owned by `pid`.
///
/// Prefers the focused window and falls back to the main window.
///
/// # Returns
///
/// * `Ok(Some(scan))` - the window was read
/// * `Ok(None)` - the app has no readable window right now
/// * `Err(AgentError::PermissionDenied)` - AX trust was revoked
/// * `Err(AgentError::TargetNotRunning)` - the process went away mid-read
pub fn scan_window(pid: i32, limits: ScanLimits) -> DomainResult<Option<WindowScan>> {
    // SAFETY: AXUIElementCreateApplication returns a +1 reference or null.
    let Some(app) = (unsafe { OwnedElement::from_create_rule(AXUIElementCreateApplication(pid)) })
    else {
        tracing::debug!(pid, "Failed to create AX element for PID");
        return Ok(None);
    };

    enable_manual_accessibility(&app);

    let window = match copy_element(&app, "AXFocusedWindow")? {
        Some(window) => window,
        None => match copy_element(&app, "AXMainWindow")? {
            Some(window) => window,
            None => {
                tracing::trace!(pid, "No readable window for PID");
                return Ok(None);
            }
        },
    };

    let mut scan = WindowScan {
        title: copy_string(window.as_ptr(), "AXTitle").filter(|title| !title.is_empty()),
        ..WindowScan::default()
    };
    walk(window.as_ptr(), 0, limits, &mut scan);

    tracing::trace!(
        pid,
        turns = scan.turns.len(),
        nodes = scan.nodes_visited,
        generating = scan.generating,
        "Scanned target window"
    );
    Ok(Some(scan))
}

/// Chromium-based apps only build their AX tree once asked to.
fn enable_manual_accessibility(app: &OwnedElement) {
    let attribute = CFString::from_static_string("AXManualAccessibility");
    let value = CFBoolean::true_value();
    // SAFETY: both CF objects outlive the call; the element is a live +1 ref.
    let status = unsafe {
        AXUIElementSetAttributeValue(
            app.as_ptr(),
            attribute.as_concrete_TypeRef(),
            value.as_CFTypeRef(),
        )
    };
    if status != K_AX_ERROR_SUCCESS {
        tracing::trace!(status, "AXManualAccessibility not accepted");
    }
}

/// Copy an element-valued attribute, mapping AX status codes.
fn copy_element(owner: &OwnedElement, name: &'static str) -> DomainResult<Option<OwnedElement>> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = std::ptr::null();
    // SAFETY: `owner` is a live element and `value` is a valid out pointer.
    let status = unsafe {
        AXUIElementCopyAttributeValue(owner.as_ptr(), attribute.as_concrete_TypeRef(), &mut value)
    };

    match status {
        // SAFETY: a successful copy hands us a +1 reference.
        K_AX_ERROR_SUCCESS => Ok(unsafe { OwnedElement::from_create_rule(value.cast()) }),
        K_AX_ERROR_API_DISABLED => Err(ax_permission_error()),
        K_AX_ERROR_INVALID_UI_ELEMENT => Err(jiffy_domain::AgentError::TargetNotRunning(
            "target process no longer exposes an AX element".to_string(),
        )),
        K_AX_ERROR_NO_VALUE | K_AX_ERROR_ATTRIBUTE_UNSUPPORTED | K_AX_ERROR_CANNOT_COMPLETE => {
            Ok(None)
        }
        other => Err(ax_call_error(name, other)),
    }
}

/// Copy any attribute as an owned CF value, or `None` on any AX failure.
fn copy_value(element: AXUIElementRef, name: &'static str) -> Option<CFType> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = std::ptr::null();
    // SAFETY: `element` is kept alive by its owner for the duration of the
    // call and `value` is a valid out pointer.
    let status =
        unsafe { AXUIElementCopyAttributeValue(element, attribute.as_concrete_TypeRef(), &mut value) };
    if status != K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }
    // SAFETY: wrap_under_create_rule takes ownership of the copied value and
    // releases it on drop.
    Some(unsafe { CFType::wrap_under_create_rule(value) })
}

fn copy_string(element: AXUIElementRef, name: &'static str) -> Option<String> {
    copy_value(element, name)?.downcast::<CFString>().map(|s| s.to_string())
}

fn copy_array(element: AXUIElementRef, name: &'static str) -> Option<CFArray> {
    copy_value(element, name)?.downcast::<CFArray>()
}

fn class_list(element: AXUIElementRef) -> Vec<String> {
    let Some(classes) = copy_array(element, "AXDOMClassList") else {
        return Vec::new();
    };
    classes
        .iter()
        .filter_map(|item| {
            // SAFETY: the item is borrowed from `classes`, which is alive.
            let value = unsafe { CFType::wrap_under_get_rule(*item as CFTypeRef) };
            value.downcast::<CFString>().map(|s| s.to_string())
        })
        .collect()
}

fn turn_role(classes: &[String]) -> Option<TurnRole> {
    if classes.iter().any(|c| c == USER_TURN_CLASS) {
        Some(TurnRole::User)
    } else if classes.iter().any(|c| c == ASSISTANT_TURN_CLASS) {
        Some(TurnRole::Assistant)
    } else {
        None
    }
}

/// Visit `element`'s children, borrowing each from the array.
fn for_each_child(element: AXUIElementRef, mut visit: impl FnMut(AXUIElementRef) -> bool) {
    let Some(children) = copy_array(element, "AXChildren") else {
        return;
    };
    for child in children.iter() {
        if !visit((*child).cast()) {
            break;
        }
    }
}

fn budget_left(depth: usize, limits: ScanLimits, scan: &WindowScan) -> bool {
    depth <= limits.max_depth && scan.nodes_visited < limits.max_nodes
}

fn walk(element: AXUIElementRef, depth: usize, limits: ScanLimits, scan: &mut WindowScan) {
    if !budget_left(depth, limits, scan) {
        return;
    }
    scan.nodes_visited += 1;

    if let Some(role) = turn_role(&class_list(element)) {
        let mut pieces = Vec::new();
        collect_text(element, depth, limits, scan, &mut pieces);
        scan.turns.push(ConversationTurn::new(role, pieces.join("\n")));
        return;
    }

    match copy_string(element, "AXRole").as_deref() {
        Some("AXTextArea") => {
            let length = copy_string(element, "AXValue").map_or(0, |v| v.chars().count());
            scan.composer_length = scan.composer_length.max(length);
        }
        Some("AXButton") => {
            let label = copy_string(element, "AXDescription")
                .or_else(|| copy_string(element, "AXTitle"))
                .unwrap_or_default();
            if label.contains(STOP_BUTTON_LABEL) {
                scan.generating = true;
            }
        }
        _ => {}
    }

    for_each_child(element, |child| {
        walk(child, depth + 1, limits, scan);
        budget_left(depth + 1, limits, scan)
    });
}

fn collect_text(
    element: AXUIElementRef,
    depth: usize,
    limits: ScanLimits,
    scan: &mut WindowScan,
    pieces: &mut Vec<String>,
) {
    for_each_child(element, |child| {
        if !budget_left(depth + 1, limits, scan) {
            return false;
        }
        scan.nodes_visited += 1;
        if copy_string(child, "AXRole").as_deref() == Some("AXStaticText") {
            if let Some(text) = copy_string(child, "AXValue").filter(|t| !t.trim().is_empty()) {
                pieces.push(text);
            }
        } else {
            collect_text(child, depth + 1, limits, scan, pieces);
        }
        true
    });
}
