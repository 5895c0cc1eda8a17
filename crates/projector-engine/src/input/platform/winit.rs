use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::input::{InputRequest, Key, KeyState, request_for_key};

/// Translates a winit `WindowEvent` into an overlay request.
///
/// Returns `None` for events the overlay ignores.
pub(crate) fn translate_window_event(event: &WindowEvent) -> Option<InputRequest> {
    match event {
        WindowEvent::CloseRequested => Some(InputRequest::Shutdown),

        WindowEvent::KeyboardInput { event, .. } => {
            let state = match event.state {
                ElementState::Pressed => KeyState::Pressed,
                ElementState::Released => KeyState::Released,
            };
            request_for_key(map_key(event.physical_key), state, event.repeat)
        }

        _ => None,
    }
}

fn map_key(pk: PhysicalKey) -> Key {
    match pk {
        PhysicalKey::Code(KeyCode::Escape) => Key::Escape,
        PhysicalKey::Code(KeyCode::KeyF) => Key::F,
        PhysicalKey::Code(KeyCode::KeyG) => Key::G,
        PhysicalKey::Code(other) => Key::Unknown(other as u32),
        // NativeKeyCode has no stable numeric form in winit 0.30.
        PhysicalKey::Unidentified(_) => Key::Unknown(0),
    }
}
