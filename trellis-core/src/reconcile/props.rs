//! Property application.
//!
//! Each property name maps onto one host operation:
//!
//! | name                         | host effect                                  |
//! |------------------------------|----------------------------------------------|
//! | `class` / `className`        | `class` attribute, optionally signal-bound   |
//! | `on<kind>`                   | delegated handler for `kind`                 |
//! | `style`                      | one style property per declaration          |
//! | boolean attributes           | property plus presence attribute             |
//! | `value`, `indeterminate`, ...| host property                                |
//! | `data-*`, `aria-*`           | attribute when truthy, removed otherwise     |
//! | `href`, `src`, `action`, ... | attribute unless the URL is script-bearing   |
//! | anything else                | attribute                                    |
//!
//! Raw markup properties (`innerHTML` and friends) are refused outright:
//! text only ever reaches the host as text nodes or escaped attributes.

use std::rc::Rc;

use tracing::{trace, warn};

use crate::host::{HostNode, HostValue};
use crate::runtime::RuntimeInner;
use crate::vdom::{PropValue, Props};

const RAW_MARKUP: &[&str] = &["innerHTML", "outerHTML", "dangerouslySetInnerHTML", "srcdoc"];

const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "checked", "disabled", "hidden", "readonly", "required", "selected", "multiple", "autofocus",
    "open",
];

const DIRECT_PROPERTIES: &[&str] = &["value", "indeterminate", "selectedIndex", "textContent"];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];

const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

/// Apply every property of a freshly built element.
pub(super) fn apply_all(runtime: &Rc<RuntimeInner>, host: &HostNode, props: &Props) {
    for (name, value) in props.iter() {
        apply(runtime, host, name, Some(value));
    }
}

/// Apply the difference between `old` and `new` to `host`.
pub(super) fn diff(runtime: &Rc<RuntimeInner>, host: &HostNode, old: &Props, new: &Props) {
    for (name, _) in old.iter() {
        if !new.contains(name) {
            apply(runtime, host, name, None);
        }
    }
    for (name, value) in new.iter() {
        if old.get(name) != Some(value) {
            apply(runtime, host, name, Some(value));
        }
    }
}

/// Whether `url` would run script when followed or loaded.
fn is_script_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    SCRIPT_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

/// Set (`Some`) or clear (`None`) one property.
fn apply(runtime: &Rc<RuntimeInner>, host: &HostNode, name: &str, value: Option<&PropValue>) {
    if RAW_MARKUP.contains(&name) {
        if value.is_some() {
            warn!(property = name, "raw markup property refused");
        }
        return;
    }

    if name == "class" || name == "className" {
        return apply_class(runtime, host, value);
    }

    if let Some(kind) = name.strip_prefix("on").filter(|kind| !kind.is_empty()) {
        let kind = kind.to_ascii_lowercase();
        match value {
            Some(PropValue::Handler(handler)) => {
                runtime.events.register(runtime, host, &kind, handler.clone())
            }
            Some(other) if other.is_truthy() => {
                warn!(property = name, "event property is not a handler; ignored");
                runtime.events.unregister(host, &kind);
            }
            _ => runtime.events.unregister(host, &kind),
        }
        return;
    }

    if name == "style" {
        return apply_style(host, value);
    }

    if BOOLEAN_ATTRIBUTES.contains(&name) {
        let on = value.is_some_and(PropValue::is_truthy);
        host.set_property(name, HostValue::Bool(on));
        if on {
            host.set_attribute(name, "");
        } else {
            host.remove_attribute(name);
        }
        return;
    }

    if DIRECT_PROPERTIES.contains(&name) {
        match value.and_then(host_value) {
            Some(value) => host.set_property(name, value),
            None => host.remove_property(name),
        }
        return;
    }

    if name.starts_with("data-") || name.starts_with("aria-") {
        match value.filter(|value| value.is_truthy()).and_then(PropValue::as_text) {
            Some(text) => host.set_attribute(name, &text),
            None => host.remove_attribute(name),
        }
        return;
    }

    let text = match value {
        None | Some(PropValue::Null) | Some(PropValue::Bool(false)) => None,
        Some(PropValue::Bool(true)) => Some(String::new()),
        Some(other) => match other.as_text() {
            Some(text) => Some(text),
            None => {
                trace!(property = name, "non-scalar value has no attribute form; ignored");
                return;
            }
        },
    };

    match text {
        Some(url) if URL_ATTRIBUTES.contains(&name) && is_script_url(&url) => {
            warn!(property = name, "script URL refused");
            host.remove_attribute(name);
        }
        Some(text) => host.set_attribute(name, &text),
        None => host.remove_attribute(name),
    }
}

fn apply_class(runtime: &Rc<RuntimeInner>, host: &HostNode, value: Option<&PropValue>) {
    runtime.unbind_class(host);
    match value {
        Some(PropValue::Class(signal)) => {
            host.set_attribute("class", &signal.get_untracked());
            let target = host.downgrade();
            match signal.subscribe(move |class: &String| {
                if let Some(host) = target.upgrade() {
                    host.set_attribute("class", class);
                }
            }) {
                Ok(subscription) => runtime.bind_class(host, subscription),
                Err(err) => warn!(%err, "class binding failed; attribute will not follow the signal"),
            }
        }
        Some(value) if value.is_truthy() => match value.as_text() {
            Some(class) => host.set_attribute("class", &class),
            None => host.remove_attribute("class"),
        },
        _ => host.remove_attribute("class"),
    }
}

fn apply_style(host: &HostNode, value: Option<&PropValue>) {
    host.remove_attribute("style");
    match value {
        Some(PropValue::Style(declarations)) => {
            host.retain_style(|property| declarations.contains_key(property));
            for (property, value) in declarations {
                host.set_style(property, value);
            }
        }
        Some(PropValue::Str(text)) => {
            host.retain_style(|_| false);
            for declaration in text.split(';') {
                if let Some((property, value)) = declaration.split_once(':') {
                    host.set_style(property.trim(), value.trim());
                }
            }
        }
        _ => host.retain_style(|_| false),
    }
}

fn host_value(value: &PropValue) -> Option<HostValue> {
    match value {
        PropValue::Bool(b) => Some(HostValue::Bool(*b)),
        PropValue::Int(i) => Some(HostValue::Number(*i as f64)),
        PropValue::Float(f) => Some(HostValue::Number(*f)),
        PropValue::Str(s) => Some(HostValue::Text(s.clone())),
        PropValue::Class(signal) => Some(HostValue::Text(signal.get_untracked())),
        _ => None,
    }
}
