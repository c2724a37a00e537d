//! Global hotkeys.
//!
//! Strings like `ctrl+shift+alt+a` are parsed into a modifier mask and a
//! Windows virtual-key code. On Windows a dedicated thread registers the
//! bindings with `RegisterHotKey` and pumps its message queue, forwarding
//! each press as a [`HotkeyEvent`] over an unbounded channel, so the
//! listener never waits on the worker.

use tokio::sync::mpsc::UnboundedSender;

// Win32 `HOT_KEY_MODIFIERS` bits.
pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
pub const MOD_WIN: u32 = 0x0008;
pub const MOD_NOREPEAT: u32 = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Analyze queued captures (or the current screen).
    Analyze,
    /// Capture the screen into the queue.
    Capture,
    /// Enable/disable the assistant.
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyParseError {
    #[error("hotkey is empty")]
    Empty,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("hotkey '{0}' has no non-modifier key")]
    MissingKey(String),
    #[error("hotkey '{0}' has more than one non-modifier key")]
    MultipleKeys(String),
    #[error("hotkey '{0}' needs at least one modifier")]
    NoModifier(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    /// `MOD_*` bits.
    pub modifiers: u32,
    /// Windows virtual-key code.
    pub vk: u32,
}

/// Parse `ctrl+shift+alt+a` style bindings. Case and spaces are ignored.
pub fn parse(spec: &str) -> Result<Hotkey, HotkeyParseError> {
    let normalized: String = spec
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if normalized.is_empty() {
        return Err(HotkeyParseError::Empty);
    }

    let mut modifiers = 0;
    let mut vk = None;
    for token in normalized.split('+') {
        match token {
            "ctrl" | "control" => modifiers |= MOD_CONTROL,
            "shift" => modifiers |= MOD_SHIFT,
            "alt" => modifiers |= MOD_ALT,
            "win" | "windows" | "super" | "meta" => modifiers |= MOD_WIN,
            other => {
                let code =
                    vk_code(other).ok_or_else(|| HotkeyParseError::UnknownKey(other.to_string()))?;
                if vk.replace(code).is_some() {
                    return Err(HotkeyParseError::MultipleKeys(spec.to_string()));
                }
            }
        }
    }

    let vk = vk.ok_or_else(|| HotkeyParseError::MissingKey(spec.to_string()))?;
    if modifiers == 0 {
        return Err(HotkeyParseError::NoModifier(spec.to_string()));
    }
    Ok(Hotkey { modifiers, vk })
}

fn vk_code(key: &str) -> Option<u32> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_ascii_uppercase() as u32);
        }
        if c.is_ascii_digit() {
            return Some(c as u32);
        }
    }
    if let Some(n) = key.strip_prefix('f').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=24).contains(&n) {
            return Some(0x70 + n - 1);
        }
    }
    let code = match key {
        "space" => 0x20,
        "enter" | "return" => 0x0D,
        "tab" => 0x09,
        "esc" | "escape" => 0x1B,
        "backspace" => 0x08,
        "insert" | "ins" => 0x2D,
        "delete" | "del" => 0x2E,
        "home" => 0x24,
        "end" => 0x23,
        "pageup" | "pgup" => 0x21,
        "pagedown" | "pgdn" => 0x22,
        "up" => 0x26,
        "down" => 0x28,
        "left" => 0x25,
        "right" => 0x27,
        "printscreen" | "prtsc" => 0x2C,
        "pause" => 0x13,
        _ => return None,
    };
    Some(code)
}

/// A parsed binding and the event it fires.
#[derive(Debug, Clone)]
pub struct Binding {
    pub label: String,
    pub hotkey: Hotkey,
    pub event: HotkeyEvent,
}

/// Parse the three configured hotkeys. A binding that fails to parse is
/// logged and skipped; the rest still register.
pub fn bindings(analyze: &str, capture: &str, toggle: &str) -> Vec<Binding> {
    [
        (analyze, HotkeyEvent::Analyze),
        (capture, HotkeyEvent::Capture),
        (toggle, HotkeyEvent::Toggle),
    ]
    .into_iter()
    .filter_map(|(label, event)| match parse(label) {
        Ok(hotkey) => Some(Binding {
            label: label.to_string(),
            hotkey,
            event,
        }),
        Err(e) => {
            log::error!("[HOTKEY] Ignoring {:?} binding '{}': {}", event, label, e);
            None
        }
    })
    .collect()
}

// ── Listener ─────────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
pub fn spawn_listener(bindings: Vec<Binding>, tx: UnboundedSender<HotkeyEvent>) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse as km;
    use windows::Win32::UI::WindowsAndMessaging as wm;

    std::thread::Builder::new()
        .name("hotkey-listener".to_string())
        .spawn(move || unsafe {
            let mut registered = Vec::new();
            for (i, binding) in bindings.iter().enumerate() {
                let id = i as i32 + 1;
                let mods = km::HOT_KEY_MODIFIERS(binding.hotkey.modifiers | MOD_NOREPEAT);
                if km::RegisterHotKey(HWND(std::ptr::null_mut()), id, mods, binding.hotkey.vk)
                    .is_err()
                {
                    log::error!("[HOTKEY] RegisterHotKey {} FAILED (in use?)", binding.label);
                } else {
                    log::info!("[HOTKEY] Registered {} -> {:?}", binding.label, binding.event);
                    registered.push((id, binding.event));
                }
            }

            loop {
                let mut msg = wm::MSG::default();
                let got = wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0);
                if got.0 <= 0 {
                    log::info!("[HOTKEY] Message loop ended ({})", got.0);
                    break;
                }
                if msg.message == wm::WM_HOTKEY {
                    let id = msg.wParam.0 as i32;
                    if let Some((_, event)) = registered.iter().find(|(rid, _)| *rid == id) {
                        if tx.send(*event).is_err() {
                            break;
                        }
                    }
                }
            }

            for (id, _) in registered {
                let _ = km::UnregisterHotKey(HWND(std::ptr::null_mut()), id);
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| log::error!("[HOTKEY] Failed to start listener thread: {}", e));
}

#[cfg(not(target_os = "windows"))]
pub fn spawn_listener(bindings: Vec<Binding>, _tx: UnboundedSender<HotkeyEvent>) {
    for binding in &bindings {
        log::warn!(
            "[HOTKEY] Global hotkeys are only available on Windows; '{}' not registered",
            binding.label
        );
    }
}
