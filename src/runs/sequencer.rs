//! Walks a program's action tree and dispatches each action
//!
//! One `ExecutionContext` exists per run. It owns the loop index, the cursor
//! (a path into the action tree) and the cancellation token, and it decides
//! per error kind whether the run continues:
//!
//! - sensor failures (capture, OCR, reference images) are reported as
//!   warnings and the action is treated as a no-op or a miss
//! - input and clipboard failures end the run as `Failed`
//! - cancellation ends the run as `Cancelled` at the next check point
//!
//! Collaborators are blocking, so every call goes through tokio's blocking
//! pool. Results that arrive after cancellation are dropped.

use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::models::RunOutcome;
use super::reporter::RunReporter;
use super::tree::{ActionTree, NodeId};
use crate::config::RunnerConfig;
use crate::desktop::Devices;
use crate::error::{InjectionError, SensorError};
use crate::models::{Action, ActionPath, AutoDelay, ImageCheck, KeyCode, MacroProgram, OcrRead, Processing};
use crate::vision::{self, extract_for, recognize_with_fallback};

/// Why a walk stopped early.
#[derive(Debug)]
enum Stop {
    Cancelled,
    Failed(InjectionError),
}

impl From<InjectionError> for Stop {
    fn from(err: InjectionError) -> Self {
        Stop::Failed(err)
    }
}

type Step<T = ()> = std::result::Result<T, Stop>;

/// Position in one list of siblings while walking.
struct Frame<'t> {
    nodes: &'t [NodeId],
    next: usize,
    /// Centre of the matched region when this list is an image check's branch.
    found: Option<(i32, i32)>,
}

/// Seconds from a program as a `Duration`, saturating where unrepresentable.
fn secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(if seconds > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Run a blocking collaborator call on the blocking pool.
///
/// A panic inside `f` is reported through `worker`.
async fn blocking<T, E, F>(f: F, worker: fn(String) -> E) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(worker(e.to_string())),
    }
}

pub struct ExecutionContext {
    devices: Devices,
    config: RunnerConfig,
    cancel: CancellationToken,
    reporter: RunReporter,
    auto_delay: AutoDelay,
    loop_index: u32,
    cursor: ActionPath,
    dispatched: usize,
    error: Option<String>,
}

impl ExecutionContext {
    pub fn new(
        devices: Devices,
        config: RunnerConfig,
        cancel: CancellationToken,
        reporter: RunReporter,
    ) -> Self {
        Self {
            devices,
            config,
            cancel,
            reporter,
            auto_delay: AutoDelay::off(),
            loop_index: 0,
            cursor: ActionPath::default(),
            dispatched: 0,
            error: None,
        }
    }

    /// 1-based index of the loop being executed, 0 before the first.
    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    pub fn cursor(&self) -> &ActionPath {
        &self.cursor
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Message of the injection failure that ended the run, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Countdown, then every loop of `program`.
    pub async fn run(&mut self, program: &MacroProgram) -> RunOutcome {
        self.auto_delay = program.auto_delay;
        let tree = ActionTree::build(&program.actions);

        let result = async {
            self.countdown().await?;
            for i in 1..=program.loop_count {
                self.checkpoint()?;
                self.loop_index = i;
                self.reporter
                    .info(format!("Executing loop {}/{}", i, program.loop_count));
                self.walk(&tree).await?;
            }
            Ok::<(), Stop>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.reporter.info("Macro completed");
                RunOutcome::Completed
            }
            Err(Stop::Cancelled) => {
                self.reporter.info("Macro stopped");
                RunOutcome::Cancelled
            }
            Err(Stop::Failed(err)) => {
                let message = if self.cursor.depth() > 0 {
                    format!("Action {} failed: {}", self.cursor, err)
                } else {
                    err.to_string()
                };
                self.reporter.error(message.clone());
                self.error = Some(message);
                RunOutcome::Failed
            }
        }
    }

    async fn countdown(&self) -> Step {
        let whole = self.config.countdown.as_secs();
        for remaining in (1..=whole).rev() {
            self.reporter.info(format!("Starting in {}...", remaining));
            self.sleep(Duration::from_secs(1)).await?;
        }
        // Sub-second remainder, if any
        self.sleep(self.config.countdown - Duration::from_secs(whole))
            .await
    }

    fn checkpoint(&self) -> Step {
        if self.cancel.is_cancelled() {
            Err(Stop::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep that wakes early on cancellation.
    async fn sleep(&self, duration: Duration) -> Step {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Stop::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    async fn auto_pause(&self) -> Step {
        if self.auto_delay.enabled {
            self.sleep(secs(self.auto_delay.seconds))
                .await
        } else {
            Ok(())
        }
    }

    /// Pre-order walk over the tree. Image checks push their branch when
    /// they match; everything else is a leaf.
    async fn walk(&mut self, tree: &ActionTree<'_>) -> Step {
        let mut stack = vec![Frame {
            nodes: tree.roots(),
            next: 0,
            found: None,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(&id) = frame.nodes.get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let found = frame.found;

            self.cursor = tree.path(id).clone();
            let action = tree.action(id);
            self.checkpoint()?;
            self.reporter
                .info(format!("Action {}: {}", self.cursor, action));

            match action {
                Action::ImgCheck(check) => {
                    let children = tree.children(id);
                    if self.check_image(check).await? && !children.is_empty() {
                        stack.push(Frame {
                            nodes: children,
                            next: 0,
                            found: Some(check.region.bounds().center()),
                        });
                    }
                }
                leaf => self.leaf(leaf, found).await?,
            }
        }

        Ok(())
    }

    async fn leaf(&mut self, action: &Action, found: Option<(i32, i32)>) -> Step {
        self.auto_pause().await?;
        self.checkpoint()?;
        self.dispatched += 1;
        self.dispatch(action, found).await?;
        self.auto_pause().await
    }

    async fn dispatch(&mut self, action: &Action, found: Option<(i32, i32)>) -> Step {
        match action {
            Action::Click { x, y } => self.click(*x, *y).await,
            Action::Drag { from, to } => {
                let (from, to) = (*from, *to);
                let duration = self.config.drag_duration;
                let input = Arc::clone(&self.devices.input);
                blocking(move || input.drag(from, to, duration), InjectionError::Worker).await?;
                Ok(())
            }
            Action::Delay { seconds } => self.sleep(secs(*seconds)).await,
            Action::Copy => self.hotkey(vec![KeyCode::shortcut_modifier(), KeyCode::C]).await,
            Action::Paste => self.hotkey(vec![KeyCode::shortcut_modifier(), KeyCode::V]).await,
            Action::Hotkey { keys } => {
                let codes = KeyCode::parse_all(keys.as_slice())
                    .map_err(|key| InjectionError::Input(format!("Unknown key '{}'", key)))?;
                self.hotkey(codes).await
            }
            Action::Key {
                key,
                count,
                interval,
            } => {
                let code: KeyCode = key
                    .parse()
                    .map_err(|_| InjectionError::Input(format!("Unknown key '{}'", key)))?;
                for press in 0..*count {
                    if press > 0 {
                        self.sleep(secs(*interval)).await?;
                    }
                    let input = Arc::clone(&self.devices.input);
                    blocking(move || input.press_key(code), InjectionError::Worker).await?;
                }
                Ok(())
            }
            Action::Ocr(read) => self.read_text(read).await,
            Action::ClickFound => match found {
                Some((x, y)) => self.click(x, y).await,
                None => {
                    self.reporter
                        .warning("Click-found outside a matched image check, skipped");
                    Ok(())
                }
            },
            // Image checks are handled by the walk
            Action::ImgCheck(_) => Ok(()),
        }
    }

    async fn click(&self, x: i32, y: i32) -> Step {
        let input = Arc::clone(&self.devices.input);
        blocking(move || input.click(x, y), InjectionError::Worker).await?;
        Ok(())
    }

    async fn hotkey(&self, keys: Vec<KeyCode>) -> Step {
        let input = Arc::clone(&self.devices.input);
        blocking(move || input.send_hotkey(&keys), InjectionError::Worker).await?;
        Ok(())
    }

    /// Capture, recognize, extract, then copy or show the selected value.
    async fn read_text(&mut self, read: &OcrRead) -> Step {
        let bounds = read.region.bounds();
        let screen = Arc::clone(&self.devices.screen);
        let ocr = Arc::clone(&self.devices.ocr);

        let recognized = blocking(
            move || {
                let image = screen.grab(bounds)?;
                recognize_with_fallback(ocr.as_ref(), &image)
            },
            SensorError::Worker,
        )
        .await;
        self.checkpoint()?;

        let raw = match recognized {
            Ok(raw) => raw,
            Err(e) => {
                self.reporter.warning(format!("OCR skipped: {}", e));
                return Ok(());
            }
        };

        let result = extract_for(read, &raw);
        if let Some(warning) = result.warning {
            self.reporter.warning(format!("OCR skipped: {}", warning));
            return Ok(());
        }
        if result.is_empty() {
            let mode = if read.is_legacy() {
                "legacy"
            } else {
                read.mode.as_str()
            };
            self.reporter
                .info(format!("OCR: No matches found for mode '{}'", mode));
            return Ok(());
        }

        if !read.processing.writes_clipboard() {
            self.reporter
                .info(format!("OCR result: '{}'", result.selected));
            return Ok(());
        }

        let clipboard = Arc::clone(&self.devices.clipboard);
        let text = result.selected.clone();
        blocking(move || clipboard.write(&text), InjectionError::Worker).await?;

        match read.processing {
            Processing::CopyAllJoined if result.matches.len() > 1 => self
                .reporter
                .info(format!("OCR: Copied {} matches", result.matches.len())),
            _ => self
                .reporter
                .info(format!("OCR: Copied '{}'", result.selected)),
        }
        Ok(())
    }

    /// Longest a wait-until-found check may poll.
    fn wait_limit(&self, check: &ImageCheck) -> Duration {
        let max = self.config.max_wait;
        if check.timeout > 0.0 {
            secs(check.timeout).min(max)
        } else {
            max
        }
    }

    fn poll_interval(&self, check: &ImageCheck) -> Duration {
        check
            .poll_interval
            .filter(|secs| *secs > 0.0)
            .map(secs)
            .unwrap_or(self.config.poll_interval)
    }

    /// Whether the check's region matches its reference image.
    ///
    /// Sensor failures are warnings and count as "not found".
    async fn check_image(&mut self, check: &ImageCheck) -> Step<bool> {
        let images = Arc::clone(&self.devices.images);
        let path = check.reference_image.clone();
        let loaded = blocking(move || images.load(&path), SensorError::Worker).await;
        self.checkpoint()?;

        let reference = match loaded {
            Ok(reference) => reference,
            Err(e) => {
                self.reporter.warning(format!("Image check skipped: {}", e));
                return Ok(false);
            }
        };

        let bounds = check.region.bounds();
        let deadline = check
            .wait_until_found
            .then(|| Instant::now() + self.wait_limit(check));
        let interval = self.poll_interval(check);

        loop {
            self.checkpoint()?;

            let screen = Arc::clone(&self.devices.screen);
            let reference = Arc::clone(&reference);
            let scored = blocking(
                move || {
                    let captured = DynamicImage::ImageRgba8(screen.grab(bounds)?);
                    Ok(vision::compare(&captured, &reference))
                },
                SensorError::Worker,
            )
            .await;
            self.checkpoint()?;

            match scored {
                Ok(score) if vision::is_found(score, check.threshold) => {
                    self.reporter.info(format!(
                        "Image found (score {:.3}, threshold {:.2})",
                        score, check.threshold
                    ));
                    return Ok(true);
                }
                Ok(score) => {
                    tracing::debug!(score, threshold = check.threshold, "Image not matched");
                    if deadline.is_none() {
                        self.reporter.info(format!(
                            "Image not found (score {:.3}, threshold {:.2})",
                            score, check.threshold
                        ));
                        return Ok(false);
                    }
                }
                Err(e) => {
                    self.reporter.warning(format!("Image check skipped: {}", e));
                    return Ok(false);
                }
            }

            let Some(deadline) = deadline else {
                return Ok(false);
            };
            let now = Instant::now();
            if now >= deadline {
                self.reporter.info(format!(
                    "Image not found within {:.1}s",
                    self.wait_limit(check).as_secs_f64()
                ));
                return Ok(false);
            }
            self.sleep(interval.min(deadline - now)).await?;
        }
    }
}
