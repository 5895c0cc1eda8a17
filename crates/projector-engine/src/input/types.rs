use std::fmt;

/// The keys the overlay reacts to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    F,
    G,
    /// Any other key, carrying the platform code.
    Unknown(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyState {
    Pressed,
    Released,
}

/// What the input layer may ask of the render loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InputRequest {
    ToggleGrid,
    ToggleFields,
    Shutdown,
}

impl fmt::Display for InputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputRequest::ToggleGrid => "toggle grid",
            InputRequest::ToggleFields => "toggle fields",
            InputRequest::Shutdown => "shutdown",
        })
    }
}

/// Key binding table. Only fresh presses count; releases and auto-repeat do
/// not toggle a layer twice.
pub fn request_for_key(key: Key, state: KeyState, repeat: bool) -> Option<InputRequest> {
    if state != KeyState::Pressed || repeat {
        return None;
    }
    match key {
        Key::G => Some(InputRequest::ToggleGrid),
        Key::F => Some(InputRequest::ToggleFields),
        Key::Escape => Some(InputRequest::Shutdown),
        Key::Unknown(_) => None,
    }
}
