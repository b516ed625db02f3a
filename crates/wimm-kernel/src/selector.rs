//! Backend selection.
//!
//! Deterministic: the same mode, kind, preference order and locator answers
//! always pick the same backend.

use wimm_types::{Backend, BackendMode, OperationKind, WimError, WimResult};

use crate::locator::ToolLocator;

/// Default preference order for [`BackendMode::Auto`].
///
/// Portable tool first. Overridable through `auto_order` in the configuration.
pub const DEFAULT_AUTO_ORDER: [Backend; 2] = [Backend::Wimlib, Backend::Dism];

/// Pick the backend that will carry out an operation of `kind`.
///
/// - `Explicit(b)`: `b` if its tool is located, else `BackendUnavailable(b)`.
///   A located backend that cannot perform `kind` is
///   `UnsupportedOperationForBackend`.
/// - `Auto`: the first backend in `order` that supports `kind` and is
///   located, else `BackendUnavailable("none")`.
pub fn select_backend(
    mode: BackendMode,
    kind: OperationKind,
    order: &[Backend],
    locator: &dyn ToolLocator,
) -> WimResult<Backend> {
    match mode {
        BackendMode::Explicit(backend) => {
            if locator.locate_backend(backend).is_none() {
                return Err(WimError::unavailable(backend));
            }
            if !backend.supports(kind) {
                return Err(WimError::UnsupportedOperationForBackend {
                    backend,
                    operation: kind,
                });
            }
            Ok(backend)
        }
        BackendMode::Auto => order
            .iter()
            .copied()
            .filter(|backend| backend.supports(kind))
            .find(|backend| locator.locate_backend(*backend).is_some())
            .ok_or_else(|| WimError::BackendUnavailable("none".to_string())),
    }
}
