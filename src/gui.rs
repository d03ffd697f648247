//! Image windows driven by a winit event loop.
//!
//! winit insists on the main thread, so [`run`] hands the application to a worker thread and keeps
//! the main thread for the event loop. The worker shows frames with [`show_image`] and reads
//! keyboard input with [`poll_key`].

mod renderer;

use std::{
    collections::{hash_map::Entry, HashMap, VecDeque},
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{Mutex, PoisonError},
};

use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer};

/// Input from any of the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// The window's close button was pressed.
    WindowClosed,
}

/// A frame on its way to the event loop.
#[derive(Debug)]
struct Frame {
    title: String,
    res: Resolution,
    rgba: Vec<u8>,
}

/// What the worker thread shares with the event loop.
struct Link {
    proxy: Mutex<EventLoopProxy<Frame>>,
    keys: Mutex<VecDeque<Key>>,
}

static LINK: OnceCell<Link> = OnceCell::new();

impl Link {
    fn get() -> anyhow::Result<&'static Link> {
        LINK.get().context("no GUI running, start the application through `gui::run`")
    }

    fn push_key(&self, key: Key) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(key);
    }
}

/// Windows by title, created on the first frame sent to each.
struct Windows {
    gpu: Rc<Gpu>,
    by_title: HashMap<String, Renderer>,
    titles: HashMap<WindowId, String>,
}

impl Windows {
    fn present(
        &mut self,
        target: &EventLoopWindowTarget<Frame>,
        frame: Frame,
    ) -> anyhow::Result<()> {
        let Frame { title, res, rgba } = frame;
        let renderer = match self.by_title.entry(title) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("opening window '{}' at {res}", entry.key());
                let renderer = Renderer::open(target, entry.key(), res, self.gpu.clone())?;
                self.titles
                    .insert(renderer.window().id(), entry.key().clone());
                entry.insert(renderer)
            }
        };
        renderer.update_texture(res, &rgba);
        renderer.window().request_redraw();
        Ok(())
    }

    fn redraw(&mut self, id: WindowId) -> anyhow::Result<()> {
        let renderer = self
            .titles
            .get(&id)
            .and_then(|title| self.by_title.get_mut(title));
        match renderer {
            Some(renderer) => renderer.redraw(),
            None => Ok(()),
        }
    }

    fn handle(
        &mut self,
        event: Event<'_, Frame>,
        target: &EventLoopWindowTarget<Frame>,
        flow: &mut ControlFlow,
    ) {
        let result = match event {
            Event::UserEvent(frame) => self.present(target, frame),
            Event::RedrawRequested(id) => self.redraw(id),
            Event::WindowEvent { event, .. } => {
                let key = match event {
                    WindowEvent::ReceivedCharacter(c) => Some(Key::Char(c)),
                    WindowEvent::CloseRequested => Some(Key::WindowClosed),
                    _ => None,
                };
                if let (Some(key), Some(link)) = (key, LINK.get()) {
                    link.push_key(key);
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::error!("GUI failure: {e:#}");
            *flow = ControlFlow::ExitWithCode(1);
        }
    }
}

/// Runs `app` on a worker thread and the GUI on this one. Never returns.
///
/// The process exits when `app` returns: with 0 on success, 1 (after printing the error) on
/// failure and 101 if `app` panicked.
pub fn run<F, R>(app: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop: EventLoop<Frame> = EventLoopBuilder::with_user_event().build();
    let link = Link {
        proxy: Mutex::new(event_loop.create_proxy()),
        keys: Mutex::new(VecDeque::new()),
    };
    if LINK.set(link).is_err() {
        log::error!("`gui::run` may only be called once");
        process::exit(1);
    }

    let gpu = pollster::block_on(Gpu::open()).unwrap_or_else(|e| {
        log::error!("cannot initialize graphics: {e:#}");
        process::exit(1);
    });

    std::thread::spawn(move || {
        let code = match catch_unwind(AssertUnwindSafe(app)) {
            Ok(result) => {
                let code = result.exit_code();
                if code != 0 {
                    result.report();
                }
                code
            }
            // The panic message was already printed by the hook.
            Err(_) => 101,
        };
        process::exit(code);
    });

    let mut windows = Windows {
        gpu: Rc::new(gpu),
        by_title: HashMap::new(),
        titles: HashMap::new(),
    };
    event_loop.run(move |event, target, flow| {
        *flow = ControlFlow::Wait;
        windows.handle(event, target, flow);
    })
}

/// Shows `image` in the window titled `title`, opening it first if needed.
///
/// Fails outside of [`run`] and after the event loop has ended.
pub fn show_image(title: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    let frame = Frame {
        title: title.into(),
        res: image.resolution(),
        rgba: image.buf.as_raw().clone(),
    };
    Link::get()?
        .proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(frame)
        .map_err(|_| anyhow!("the GUI event loop has ended"))
}

/// Takes the oldest unread key, without blocking. Always `None` outside of [`run`].
pub fn poll_key() -> Option<Key> {
    LINK.get()?
        .keys
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_event_loop() {
        assert!(show_image("test", &Image::new(2, 2)).is_err());
        assert_eq!(poll_key(), None);
    }
}
