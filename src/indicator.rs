use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::display::{Renderer, build_view};
use crate::notify::{Notifier, check_notifications};
use crate::settings::{
    KeyFilter, MAX_UPDATE_INTERVAL_SECS, MIN_UPDATE_INTERVAL_SECS, SettingsStore, SubscriptionId,
};

pub struct IndicatorConfig {
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<Mutex<SettingsStore>>,
    pub renderer: Box<dyn Renderer>,
    pub notifier: Box<dyn Notifier>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Wake {
    Refresh,
    SettingsChanged(String),
    Stop,
}

/// Running indicator. Dropping the handle stops the worker.
pub struct IndicatorHandle {
    wake: Sender<Wake>,
    settings: Arc<Mutex<SettingsStore>>,
    subscriptions: Vec<SubscriptionId>,
    join: Option<JoinHandle<()>>,
}

impl IndicatorHandle {
    /// Requests an immediate re-render.
    pub fn refresh(&self) {
        let _ = self.wake.send(Wake::Refresh);
    }

    pub fn settings(&self) -> Arc<Mutex<SettingsStore>> {
        Arc::clone(&self.settings)
    }

    fn shutdown(&mut self) {
        let _ = self.wake.send(Wake::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        if let Ok(mut store) = self.settings.lock() {
            for id in self.subscriptions.drain(..) {
                store.unsubscribe(id);
            }
        }
    }
}

impl Drop for IndicatorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start(config: IndicatorConfig) -> Result<IndicatorHandle> {
    let IndicatorConfig {
        clock,
        settings,
        renderer,
        notifier,
    } = config;
    let clock_label = clock.label();
    let (wake, rx) = mpsc::channel();

    let subscriptions = {
        let sender = wake.clone();
        let mut store = settings
            .lock()
            .map_err(|_| anyhow!("failed to lock settings store"))?;
        let any = store.subscribe(KeyFilter::Any, move |key, _| {
            let _ = sender.send(Wake::SettingsChanged(key.to_string()));
        });
        let interval = store.subscribe(KeyFilter::key("update-interval"), |_, settings| {
            info!(
                seconds = poll_interval(settings.update_interval).as_secs(),
                "poll interval changed"
            );
        });
        vec![any, interval]
    };

    let settings_for_thread = Arc::clone(&settings);
    let join = thread::Builder::new()
        .name("memento-mori-indicator".to_string())
        .spawn(move || run_loop(rx, clock, settings_for_thread, renderer, notifier));
    let join = match join {
        Ok(join) => join,
        Err(err) => {
            if let Ok(mut store) = settings.lock() {
                for id in subscriptions {
                    store.unsubscribe(id);
                }
            }
            return Err(anyhow!("failed to spawn indicator thread: {err}"));
        }
    };
    info!(clock = clock_label, "indicator started");

    Ok(IndicatorHandle {
        wake,
        settings,
        subscriptions,
        join: Some(join),
    })
}

/// Stops the worker, joins it and removes its settings subscriptions.
pub fn stop(handle: IndicatorHandle) {
    drop(handle);
    info!("indicator stopped");
}

pub fn poll_interval(update_interval_secs: u64) -> Duration {
    Duration::from_secs(
        update_interval_secs.clamp(MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS),
    )
}

fn run_loop(
    rx: mpsc::Receiver<Wake>,
    clock: Arc<dyn Clock>,
    settings: Arc<Mutex<SettingsStore>>,
    mut renderer: Box<dyn Renderer>,
    mut notifier: Box<dyn Notifier>,
) {
    let mut interval = poll_interval(MIN_UPDATE_INTERVAL_SECS);
    loop {
        match evaluate(
            clock.as_ref(),
            &settings,
            renderer.as_mut(),
            notifier.as_mut(),
        ) {
            Ok(next) => interval = next,
            Err(err) => warn!(error = %format!("{err:#}"), "indicator evaluation failed"),
        }

        match rx.recv_timeout(interval) {
            Ok(Wake::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Wake::Refresh) => debug!("manual refresh"),
            Ok(Wake::SettingsChanged(key)) => debug!(%key, "settings changed, re-rendering"),
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

/// One pass: a single clock reading feeds the view and the milestone check.
fn evaluate(
    clock: &dyn Clock,
    settings: &Mutex<SettingsStore>,
    renderer: &mut dyn Renderer,
    notifier: &mut dyn Notifier,
) -> Result<Duration> {
    let instant = clock.now()?;
    let (view, interval) = {
        let mut store = settings
            .lock()
            .map_err(|_| anyhow!("failed to lock settings store"))?;
        let view = build_view(store.settings(), instant);
        let interval = poll_interval(store.settings().update_interval);
        if let Err(err) = check_notifications(&mut store, notifier, instant) {
            warn!(error = %format!("{err:#}"), "milestone check failed");
        }
        (view, interval)
    };
    if let Err(err) = renderer.render(&view) {
        warn!(error = %format!("{err:#}"), "render failed");
    }
    Ok(interval)
}
