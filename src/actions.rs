use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::str::FromStr;

use crate::keys::{Key, KeyChord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

impl FromStr for Button {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Button::Left),
            "right" => Ok(Button::Right),
            "middle" => Ok(Button::Middle),
            other => Err(anyhow!("unknown mouse button: {other}")),
        }
    }
}

/// Pointer and keyboard injection.
pub trait InputSink {
    fn set_position(&mut self, x: i32, y: i32) -> Result<()>;
    fn press(&mut self, button: Button) -> Result<()>;
    fn release(&mut self, button: Button) -> Result<()>;
    /// Positive steps scroll up.
    fn scroll_vertical(&mut self, steps: i32) -> Result<()>;
    /// Positive steps scroll right.
    fn scroll_horizontal(&mut self, steps: i32) -> Result<()>;
    fn press_key(&mut self, key: Key) -> Result<()>;
    fn release_key(&mut self, key: Key) -> Result<()>;

    fn click(&mut self, button: Button) -> Result<()> {
        self.press(button)?;
        self.release(button)
    }

    fn key_chord(&mut self, chord: &KeyChord) -> Result<()> {
        with_chord(self, chord, |_| Ok(()))
    }
}

/// Holds `chord` down around `f`. Every key that went down is released
/// again, even when a press, `f` or another release fails; the first error wins.
pub fn with_chord<S: InputSink + ?Sized>(
    sink: &mut S,
    chord: &KeyChord,
    f: impl FnOnce(&mut S) -> Result<()>,
) -> Result<()> {
    let mut held = 0;
    let mut result = Ok(());
    for k in chord.keys() {
        if let Err(e) = sink.press_key(*k) {
            result = Err(e);
            break;
        }
        held += 1;
    }
    if result.is_ok() {
        result = f(sink);
    }
    for k in chord.keys()[..held].iter().rev() {
        if let Err(e) = sink.release_key(*k)
            && result.is_ok()
        {
            result = Err(e);
        }
    }
    result
}

/// uinput-backed sink. Without a device every call is a logged no-op.
pub struct UinputSink {
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    /// `extent` is the virtual desktop size the absolute axes span.
    pub fn new(extent: (i32, i32)) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create(extent)?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            let _ = extent;
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    fn device(&mut self) -> Option<&mut LinuxUinput> {
        self.linux.as_deref_mut()
    }
}

impl InputSink for UinputSink {
    fn set_position(&mut self, x: i32, y: i32) -> Result<()> {
        match self.device() {
            Some(dev) => dev.position(x, y),
            None => {
                debug!("noop: set_position({x}, {y})");
                Ok(())
            }
        }
    }

    fn press(&mut self, button: Button) -> Result<()> {
        match self.device() {
            Some(dev) => dev.button(button, 1),
            None => Ok(()),
        }
    }

    fn release(&mut self, button: Button) -> Result<()> {
        match self.device() {
            Some(dev) => dev.button(button, 0),
            None => Ok(()),
        }
    }

    fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        match self.device() {
            Some(dev) => dev.wheel(true, steps),
            None => Ok(()),
        }
    }

    fn scroll_horizontal(&mut self, steps: i32) -> Result<()> {
        match self.device() {
            Some(dev) => dev.wheel(false, steps),
            None => Ok(()),
        }
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        match self.device() {
            Some(dev) => dev.key(key, 1),
            None => Ok(()),
        }
    }

    fn release_key(&mut self, key: Key) -> Result<()> {
        match self.device() {
            Some(dev) => dev.key(key, 0),
            None => Ok(()),
        }
    }
}

#[cfg(target_os = "linux")]
fn map_key(key: Key) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match key {
        Key::Ctrl => K::LeftControl,
        Key::Alt => K::LeftAlt,
        Key::Shift => K::LeftShift,
        Key::Super => K::LeftMeta,
        Key::Tab => K::Tab,
        Key::Minus => K::Minus,
        Key::Equal => K::Equal,
        Key::Up => K::Up,
        Key::Down => K::Down,
        Key::Left => K::Left,
        Key::Right => K::Right,
        Key::Home => K::Home,
        Key::End => K::End,
        Key::PageUp => K::PageUp,
        Key::PageDown => K::PageDown,
        Key::Enter => K::Enter,
        Key::Escape => K::Esc,
        Key::Space => K::Space,
        Key::Backspace => K::BackSpace,
        Key::Delete => K::Delete,
        Key::Function(n) => match n {
            1 => K::F1,
            2 => K::F2,
            3 => K::F3,
            4 => K::F4,
            5 => K::F5,
            6 => K::F6,
            7 => K::F7,
            8 => K::F8,
            9 => K::F9,
            10 => K::F10,
            11 => K::F11,
            12 => K::F12,
            other => return Err(anyhow!("unsupported function key: F{other}")),
        },
        Key::Digit(d) => match d {
            0 => K::_0,
            1 => K::_1,
            2 => K::_2,
            3 => K::_3,
            4 => K::_4,
            5 => K::_5,
            6 => K::_6,
            7 => K::_7,
            8 => K::_8,
            9 => K::_9,
            other => return Err(anyhow!("unsupported digit: {other}")),
        },
        Key::Letter(c) => match c {
            'A' => K::A,
            'B' => K::B,
            'C' => K::C,
            'D' => K::D,
            'E' => K::E,
            'F' => K::F,
            'G' => K::G,
            'H' => K::H,
            'I' => K::I,
            'J' => K::J,
            'K' => K::K,
            'L' => K::L,
            'M' => K::M,
            'N' => K::N,
            'O' => K::O,
            'P' => K::P,
            'Q' => K::Q,
            'R' => K::R,
            'S' => K::S,
            'T' => K::T,
            'U' => K::U,
            'V' => K::V,
            'W' => K::W,
            'X' => K::X,
            'Y' => K::Y,
            'Z' => K::Z,
            other => return Err(anyhow!("unsupported letter: {other}")),
        },
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(not(target_os = "linux"))]
struct LinuxUinput;

#[cfg(not(target_os = "linux"))]
impl LinuxUinput {
    fn position(&mut self, _x: i32, _y: i32) -> Result<()> {
        Ok(())
    }
    fn button(&mut self, _b: Button, _v: i32) -> Result<()> {
        Ok(())
    }
    fn wheel(&mut self, _vertical: bool, _steps: i32) -> Result<()> {
        Ok(())
    }
    fn key(&mut self, _k: Key, _v: i32) -> Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create(extent: (i32, i32)) -> Result<Self> {
        use uinput::event::{absolute, controller::Mouse, relative};

        let mut builder = uinput::default()?
            .name("Handctl Virtual Pointer")?
            // absolute pointer spanning the virtual desktop
            .event(absolute::Position::X)?
            .min(0)
            .max(extent.0.max(1))
            .event(absolute::Position::Y)?
            .min(0)
            .max(extent.1.max(1))
            // wheels
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            // mouse buttons
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;

        for k in Key::all() {
            builder = builder.event(map_key(k)?)?;
        }
        let dev = builder.create()?;

        info!(
            "uinput: created virtual device ({}x{} absolute)",
            extent.0, extent.1
        );
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn position(&mut self, x: i32, y: i32) -> Result<()> {
        use uinput::event::absolute::Position;
        self.dev.send(Position::X, x)?;
        self.dev.send(Position::Y, y)?;
        self.sync()
    }

    fn button(&mut self, button: Button, val: i32) -> Result<()> {
        use uinput::event::controller::Mouse;
        let b = match button {
            Button::Left => Mouse::Left,
            Button::Right => Mouse::Right,
            Button::Middle => Mouse::Middle,
        };
        self.dev.send(b, val)?;
        self.sync()
    }

    fn wheel(&mut self, vertical: bool, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        if steps == 0 {
            return Ok(());
        }
        let axis = if vertical {
            Wheel::Vertical
        } else {
            Wheel::Horizontal
        };
        self.dev.send(axis, steps)?;
        self.sync()
    }

    fn key(&mut self, key: Key, val: i32) -> Result<()> {
        self.dev.send(map_key(key)?, val)?;
        self.sync()
    }
}
