//! Run conditions for controlling when editor systems execute.
//!
//! These conditions keep input handlers from firing while the user is
//! interacting with a dialog and keep editing systems off in read-only mode.

use bevy::prelude::*;

use crate::config::AppConfig;
use crate::ui::DialogState;

/// Run condition: returns true when no modal dialog is open.
///
/// Usage: `.run_if(no_dialog_open)`
pub fn no_dialog_open(dialog_state: Res<DialogState>) -> bool {
    !dialog_state.any_modal_open
}

/// Run condition: returns true unless the app was configured read-only.
///
/// Navigation and export stay available in read-only mode; everything that
/// mutates annotations runs under this condition.
///
/// Usage: `.run_if(editing_allowed)`
pub fn editing_allowed(config: Res<AppConfig>) -> bool {
    !config.data.read_only
}
