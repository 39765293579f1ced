#![allow(dead_code)]

use async_trait::async_trait;
use certmail_core::config::LayoutConfig;
use certmail_core::services::{Compositor, LayoutSpec, TextExtent, TextFace};
use certmail_core::{CancelHandle, CertmailError, MailTransport, OutgoingMail, Recipient, TransportError};
use image::{Rgba, RgbaImage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Character the stub face has no glyph for
pub const MISSING_GLYPH: char = '\u{2603}';

/// Fixed-advance face: each glyph is `size / 2` wide and `size` tall.
/// Drawing fills the ink box so tests can find the text on the canvas.
pub struct MonoFace;

impl TextFace for MonoFace {
    fn measure(&self, text: &str, size: u32) -> certmail_core::Result<TextExtent> {
        if text.contains(MISSING_GLYPH) {
            return Err(CertmailError::Render(format!("Font has no glyph for '{}'", MISSING_GLYPH)));
        }
        let size = size as i32;
        let chars = text.chars().count() as i32;
        Ok(TextExtent {
            min_x: 0,
            min_y: 0,
            max_x: chars * size / 2,
            max_y: size,
        })
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size: u32,
        pen: (i32, i32),
        color: Rgba<u8>,
    ) -> certmail_core::Result<()> {
        let extent = self.measure(text, size)?;
        for y in pen.1 + extent.min_y..pen.1 + extent.max_y {
            for x in pen.0 + extent.min_x..pen.0 + extent.max_x {
                if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
                    canvas.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        Ok(())
    }
}

/// Layout used by the tests: anchor (1, 1) cm, box 3 cm wide, sizes 10..=40
pub fn test_layout() -> LayoutConfig {
    LayoutConfig {
        name_x_cm: 1.0,
        name_y_cm: 1.0,
        text_box_width_cm: 3.0,
        min_font_size: 10,
        max_font_size: 40,
        ..LayoutConfig::default()
    }
}

pub fn test_compositor() -> Compositor {
    let template = RgbaImage::from_pixel(600, 300, Rgba([255, 255, 255, 255]));
    let spec = LayoutSpec::new(&test_layout(), 600, 300).unwrap();
    Compositor::new(Arc::new(template), spec, Arc::new(MonoFace))
}

pub fn recipients(count: usize) -> Vec<Recipient> {
    (0..count)
        .map(|i| Recipient::new(format!("Person {}", i), format!("person{}@example.com", i)).unwrap())
        .collect()
}

/// Scripted transport: per-address queues of results, consumed one per
/// attempt. Addresses without a script (or with an exhausted one) succeed.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<(), TransportError>>>>,
    attempts: Mutex<HashMap<String, u32>>,
    delivered: Mutex<Vec<OutgoingMail>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    send_delay: Duration,
    cancel_on: Option<(String, CancelHandle)>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Cancel the batch as soon as a send to `email` starts
    pub fn cancel_on(mut self, email: &str, handle: CancelHandle) -> Self {
        self.cancel_on = Some((email.to_string(), handle));
        self
    }

    pub fn script(self, email: &str, results: Vec<Result<(), TransportError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(email.to_string(), results.into_iter().collect());
        self
    }

    pub fn attempts(&self, email: &str) -> u32 {
        self.attempts.lock().unwrap().get(email).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn delivered(&self) -> Vec<OutgoingMail> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        *self.attempts.lock().unwrap().entry(mail.to.clone()).or_insert(0) += 1;
        if let Some((email, handle)) = &self.cancel_on {
            if *email == mail.to {
                handle.cancel();
            }
        }

        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }

        let result = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&mail.to)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(()));

        if result.is_ok() {
            self.delivered.lock().unwrap().push(mail.clone());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
