//! Render pass load actions.

use super::common::{Color, MAX_COLOR_ATTACHMENTS};

/// What happens to an attachment's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    /// Clear to the attachment's value.
    #[default]
    Clear,
    /// Keep the previous contents.
    Load,
    /// Contents are undefined.
    DontCare,
}

/// Default clear color of a pass (mid grey).
pub const DEFAULT_CLEAR_COLOR: Color = Color::new(0.5, 0.5, 0.5, 1.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAction {
    pub action: Action,
    pub value: Color,
}

impl Default for ColorAction {
    fn default() -> Self {
        Self {
            action: Action::Clear,
            value: DEFAULT_CLEAR_COLOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAction {
    pub action: Action,
    pub value: f32,
}

impl Default for DepthAction {
    fn default() -> Self {
        Self {
            action: Action::Clear,
            value: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilAction {
    pub action: Action,
    pub value: u8,
}

/// Load actions of every attachment of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PassAction {
    pub colors: [ColorAction; MAX_COLOR_ATTACHMENTS],
    pub depth: DepthAction,
    pub stencil: StencilAction,
}

impl PassAction {
    /// Clear every color attachment to `color`, depth to 1 and stencil to 0.
    pub fn clear(color: Color) -> Self {
        let mut action = Self::default();
        for attachment in &mut action.colors {
            attachment.value = color;
        }
        action
    }

    /// Keep the previous contents of every attachment.
    pub fn load() -> Self {
        let mut action = Self::default();
        for attachment in &mut action.colors {
            attachment.action = Action::Load;
        }
        action.depth.action = Action::Load;
        action.stencil.action = Action::Load;
        action
    }
}
