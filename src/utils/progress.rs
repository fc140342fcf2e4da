//! Stage spinner for long dataset loads. Compiles to nothing without the
//! `progress` feature.

use std::borrow::Cow;

#[cfg(feature = "progress")]
mod bar {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::borrow::Cow;
    use std::time::Duration;

    pub struct Bar(ProgressBar);

    impl Bar {
        pub fn start(message: Cow<'static, str>) -> Self {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(message);
            pb.enable_steady_tick(Duration::from_millis(80));
            Bar(pb)
        }

        pub fn stage(&self, message: Cow<'static, str>) {
            self.0.set_message(message);
        }

        pub fn finish(&self) {
            self.0.finish_and_clear();
        }
    }
}

#[cfg(not(feature = "progress"))]
mod bar {
    use std::borrow::Cow;

    pub struct Bar;

    impl Bar {
        pub fn start(_message: Cow<'static, str>) -> Self {
            Bar
        }

        pub fn stage(&self, _message: Cow<'static, str>) {}

        pub fn finish(&self) {}
    }
}

/// Spinner shown on stderr while a dataset is loaded or indexed.
/// Cleared on drop.
pub struct LoadSpinner {
    bar: Option<bar::Bar>,
}

impl LoadSpinner {
    /// Start a spinner; `enabled = false` gives a silent handle
    pub fn start(message: impl Into<Cow<'static, str>>, enabled: bool) -> Self {
        Self {
            bar: enabled.then(|| bar::Bar::start(message.into())),
        }
    }

    /// Replace the message for the next stage
    pub fn stage(&self, message: impl Into<Cow<'static, str>>) {
        if let Some(bar) = &self.bar {
            bar.stage(message.into());
        }
    }
}

impl Drop for LoadSpinner {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}
