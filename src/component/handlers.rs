//! Property handlers.
//!
//! One applier per [`PropertyKey`]. Each receives the new value and the value
//! that was cached before it, and turns them into native mutations, queued
//! interpolations, or a list reconciliation. A value of the wrong shape for
//! the view's kind is ignored.
//!
//! Handlers only run on the UI thread, so mutations go straight to the host
//! instead of through the UI queue.

use tracing::{debug, warn};

use super::{reconcile, Component, PropertyKey};
use crate::engine::{cache, registry};
use crate::error::Result;
use crate::host::{self, Mutation};
use crate::pipeline::mount;
use crate::state::animate;
use crate::types::{Margins, Rgba, SelectOption, Value, ViewKind};

pub(super) fn apply(
    component: &Component,
    key: PropertyKey,
    value: &Value,
    previous: Option<&Value>,
) -> Result<()> {
    let node = component.native();
    let kind = component.kind();

    match key {
        PropertyKey::Disabled => host::apply(node, Mutation::SetEnabled(!value.is_truthy())),
        PropertyKey::Focus => {
            if value.is_truthy() {
                host::apply(node, Mutation::RequestFocus)?;
                host::apply(node, Mutation::ShowKeyboard)?;
            }
            Ok(())
        }
        PropertyKey::Animation => {
            match Transition::parse(value) {
                Some(transition) => queue_transition(component, transition),
                None => debug!(view = %component.key(), %value, "unrecognized animation"),
            }
            Ok(())
        }
        PropertyKey::Data => apply_data(component, value),
        PropertyKey::Value => match (kind, value) {
            (ViewKind::Input, Value::String(text)) => {
                host::apply(node, Mutation::SetInputText(text.clone()))
            }
            (ViewKind::Checkbox, Value::Bool(checked)) => {
                host::apply(node, Mutation::SetChecked(*checked))
            }
            (ViewKind::Select, _) => sync_selection(component),
            _ => Ok(()),
        },
        PropertyKey::Visible => host::apply(node, Mutation::SetVisible(value.is_truthy())),
        PropertyKey::Text => {
            if !kind.is_text_like() {
                return Ok(());
            }
            match value {
                Value::Null => host::apply(node, Mutation::SetText(String::new())),
                Value::String(text) => host::apply(node, Mutation::SetText(text.clone())),
                _ => Ok(()),
            }
        }
        PropertyKey::Color => match value.as_str().and_then(Rgba::parse) {
            Some(color) if kind.is_text_like() => host::apply(node, Mutation::SetTextColor(color)),
            _ => Ok(()),
        },
        PropertyKey::Alt => match value.as_str() {
            Some(alt) if kind == ViewKind::Image => {
                host::apply(node, Mutation::SetContentDescription(alt.to_string()))
            }
            _ => Ok(()),
        },
        PropertyKey::Src => match value.as_str() {
            Some(src) if kind == ViewKind::Image => {
                host::apply(node, Mutation::SetImage(resource_name(src)))
            }
            _ => Ok(()),
        },
        PropertyKey::Opacity => {
            let Some(to) = value.as_f64() else {
                return Ok(());
            };
            match previous.and_then(Value::as_f64) {
                Some(from) => {
                    let (from, to) = (from as f32, to as f32);
                    queue_frames(component, move |p| {
                        vec![Mutation::SetAlpha(from + p * (to - from))]
                    });
                    Ok(())
                }
                None => host::apply(node, Mutation::SetAlpha(to as f32)),
            }
        }
        PropertyKey::Background => match value.as_str().and_then(Rgba::parse) {
            Some(color) => host::apply(node, Mutation::SetBackgroundTint(color)),
            None => Ok(()),
        },
        PropertyKey::Absolute => {
            if value.as_map().is_none() {
                return Ok(());
            }
            let density = host::with_host(|h| h.density())?;
            let side = |name: &str| value.get(name).and_then(Value::as_f64).map(|v| to_px(v, density));
            let margins = Margins {
                top: side("top"),
                right: side("right"),
                bottom: side("bottom"),
                left: side("left"),
            };
            host::apply(node, Mutation::SetMargins(margins))
        }
        PropertyKey::Width => apply_dimension(component, value, previous, Mutation::SetWidth),
        PropertyKey::Height => apply_dimension(component, value, previous, Mutation::SetHeight),
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Logical units to device pixels.
fn to_px(value: f64, density: f32) -> i32 {
    (value * density as f64) as i32
}

fn apply_dimension(
    component: &Component,
    value: &Value,
    previous: Option<&Value>,
    mutation: fn(i32) -> Mutation,
) -> Result<()> {
    let Some(logical) = value.as_f64() else {
        return Ok(());
    };
    let density = host::with_host(|h| h.density())?;
    let to = to_px(logical, density);

    match previous.and_then(Value::as_f64) {
        Some(last) => {
            let from = to_px(last, density);
            queue_frames(component, move |p| {
                vec![mutation(from + (p * (to - from) as f32) as i32)]
            });
            Ok(())
        }
        None => host::apply(component.native(), mutation(to)),
    }
}

/// Queue an interpolation that applies `frame(progress)` to the view while
/// it is still bound.
fn queue_frames(component: &Component, frame: impl Fn(f32) -> Vec<Mutation> + 'static) {
    let handle = component.handle();
    let node = component.native();
    animate::enqueue(move |progress| {
        if !registry::is_alive(handle) {
            return;
        }
        for mutation in frame(progress) {
            if let Err(err) = host::apply(node, mutation) {
                warn!(%node, %err, "animation frame dropped");
                return;
            }
        }
    });
}

// =============================================================================
// Enter / exit transitions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Effect {
    Fade,
    /// Slide along x; `-1.0` from/to the left, `1.0` from/to the right.
    Slide(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    effect: Effect,
    entering: bool,
}

impl Transition {
    /// Parse `{ "name": "fade" | "left" | "right", "direction": "<normal|reverse>-<in|out>" }`.
    ///
    /// `reverse` mirrors the side of a slide.
    fn parse(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?;
        let (flow, phase) = value.get("direction")?.as_str()?.split_once('-')?;
        let reverse = match flow {
            "normal" => false,
            "reverse" => true,
            _ => return None,
        };
        let entering = match phase {
            "in" => true,
            "out" => false,
            _ => return None,
        };
        let flip = if reverse { -1.0 } else { 1.0 };
        let effect = match name {
            "fade" => Effect::Fade,
            "left" => Effect::Slide(-flip),
            "right" => Effect::Slide(flip),
            _ => return None,
        };
        Some(Self { effect, entering })
    }

    fn alpha(self, progress: f32) -> f32 {
        if self.entering { progress } else { 1.0 - progress }
    }

    fn offset(self, progress: f32, width: f32) -> Option<f32> {
        match self.effect {
            Effect::Fade => None,
            Effect::Slide(side) if self.entering => Some(side * width * (1.0 - progress)),
            Effect::Slide(side) => Some(side * width * progress),
        }
    }
}

fn queue_transition(component: &Component, transition: Transition) {
    let handle = component.handle();
    let node = component.native();
    animate::enqueue(move |progress| {
        if !registry::is_alive(handle) {
            return;
        }
        let alpha = transition.alpha(progress);
        let applied = host::with_host(|h| {
            let width = h.measured_width(node);
            if let Some(x) = transition.offset(progress, width) {
                h.apply(node, Mutation::SetTranslationX(x));
            }
            h.apply(node, Mutation::SetAlpha(alpha));
        });
        match applied {
            // Later `opacity` sets diff against what the animation left behind.
            Ok(()) => cache::store(handle, PropertyKey::Opacity, Value::from(alpha)),
            Err(err) => warn!(%node, %err, "transition frame dropped"),
        }
    });
}

// =============================================================================
// Data
// =============================================================================

fn apply_data(component: &Component, value: &Value) -> Result<()> {
    match component.kind() {
        ViewKind::Select => {
            let Some(records) = value.as_list() else {
                return Ok(());
            };
            let options = records
                .iter()
                .map(|record| SelectOption {
                    id: record.identifier().cloned(),
                    label: record.display_name().unwrap_or_default().to_string(),
                })
                .collect();
            host::apply(component.native(), Mutation::SetOptions(options))?;
            sync_selection(component)
        }
        ViewKind::Container => {
            // New items need their observers run; outside a mounted runtime
            // there is no pass to schedule.
            if reconcile(component, value)?.is_some() && mount::is_mounted() {
                mount::update_all("data")?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Select the option whose identifier equals the cached `value`.
fn sync_selection(component: &Component) -> Result<()> {
    let (Some(data), Some(selected)) = (
        component.get(PropertyKey::Data),
        component.get(PropertyKey::Value),
    ) else {
        return Ok(());
    };
    if selected.is_null() {
        return Ok(());
    }
    let position = data
        .as_list()
        .and_then(|records| records.iter().position(|r| r.identifier() == Some(&selected)));
    match position {
        Some(index) => host::apply(component.native(), Mutation::SetSelection(index)),
        None => Ok(()),
    }
}

/// Image resource for a file name: `"icons/logo.png"` → `"ic_logo"`.
fn resource_name(src: &str) -> String {
    let file = src.rsplit('/').next().unwrap_or(src);
    let stem = file.split('.').next().unwrap_or(file);
    format!("ic_{}", stem)
}
