//! In-page scripts evaluated through `Runtime.evaluate`.
//!
//! Every script is a self-contained IIFE. Arguments are spliced in as JSON
//! literals, which are valid JavaScript expressions, so no manual escaping
//! happens anywhere.

use gauntlet_core::environment::ElementQuery;
use serde::Deserialize;
use serde_json::json;

/// Shared helpers: visibility, text, and selector resolution including the
/// `tag:has-text("…")` and `text=…` forms.
const HELPERS: &str = r#"
const lower = (s) => (s == null ? '' : String(s)).toLowerCase();
const textOf = (el) => String(el.innerText || el.textContent || '').trim();
const visible = (el) => {
  if (!el || !el.isConnected) return false;
  const style = window.getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const innermost = (els) => els.filter((el) => !els.some((o) => o !== el && el.contains(o)));
const queryAll = (css) => {
  try { return Array.from(document.querySelectorAll(css)); } catch (e) { return []; }
};
const byText = (needle) => {
  const n = lower(needle).trim();
  if (!n || !document.body) return [];
  return innermost(Array.from(document.body.querySelectorAll('*'))
    .filter((el) => lower(textOf(el)).includes(n)));
};
const bySelector = (selector) => {
  const s = String(selector).trim();
  if (s.startsWith('text=')) return byText(s.slice(5).replace(/^["']|["']$/g, ''));
  const m = s.match(/^(.*?):has-text\((["'])(.*?)\2\)\s*$/);
  if (m) {
    const needle = lower(m[3]);
    return innermost(queryAll(m[1].trim() || '*').filter((el) => lower(textOf(el)).includes(needle)));
  }
  return queryAll(s);
};
const ROLES = {
  button: 'button, input[type=button], input[type=submit], input[type=reset], [role=button]',
  link: 'a[href], [role=link]',
  textbox: 'input:not([type]), input[type=text], input[type=email], input[type=search], textarea, [role=textbox]',
  checkbox: 'input[type=checkbox], [role=checkbox]',
  option: 'option, [role=option]',
};
const byRole = (role, name) => {
  const css = ROLES[role] || `[role="${CSS.escape(role)}"]`;
  const n = lower(name).trim();
  return queryAll(css).filter((el) => {
    const label = lower([el.getAttribute('aria-label'), textOf(el), el.value, el.getAttribute('title')]
      .filter(Boolean).join(' '));
    return !n || label.includes(n);
  });
};
const describe = (el) => {
  const id = el.id ? `#${el.id}` : '';
  const cls = typeof el.className === 'string' && el.className.trim()
    ? `.${el.className.trim().split(/\s+/)[0]}` : '';
  return `${el.tagName.toLowerCase()}${id}${cls}`;
};
"#;

fn iife(arg: serde_json::Value, body: &str) -> String {
    format!("(() => {{\n{HELPERS}\nconst arg = {arg};\n{body}\n}})()")
}

/// Outcome of an in-page probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    /// Nothing matched
    None,
    /// Matches exist but none is visible
    Hidden,
    Disabled,
    /// Another element sits on top of the target's center point
    Obscured,
    /// The target cannot take a value
    Unfillable,
    NoOption,
}

impl ProbeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::None => "no match",
            Self::Hidden => "hidden",
            Self::Disabled => "disabled",
            Self::Obscured => "obscured",
            Self::Unfillable => "unfillable",
            Self::NoOption => "no option",
        }
    }

    /// Whether polling again may change the answer.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::None | Self::Hidden | Self::Disabled | Self::Obscured)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Probe {
    pub status: ProbeStatus,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// How a click target is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget<'a> {
    Selector(&'a str),
    Text(&'a str),
    Role { role: &'a str, name: &'a str },
}

/// How a fill target is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillTarget<'a> {
    Selector(&'a str),
    Placeholder(&'a str),
    FirstInput,
}

/// Find the first visible, enabled match, scroll it into view and report
/// its center point if nothing covers it.
pub fn locate(target: &ClickTarget<'_>) -> String {
    let arg = match target {
        ClickTarget::Selector(s) => json!({ "kind": "selector", "selector": s }),
        ClickTarget::Text(t) => json!({ "kind": "text", "text": t }),
        ClickTarget::Role { role, name } => json!({ "kind": "role", "role": role, "name": name }),
    };
    iife(
        arg,
        r#"
const els = arg.kind === 'selector' ? bySelector(arg.selector)
  : arg.kind === 'text' ? byText(arg.text)
  : byRole(arg.role, arg.name);
if (!els.length) return { status: 'none' };
const shown = els.filter(visible);
if (!shown.length) return { status: 'hidden' };
const el = shown[0];
if (el.disabled || el.getAttribute('aria-disabled') === 'true') return { status: 'disabled' };
el.scrollIntoView({ block: 'center', inline: 'center' });
const r = el.getBoundingClientRect();
const x = r.left + r.width / 2;
const y = r.top + r.height / 2;
const top = document.elementFromPoint(x, y);
if (top && top !== el && !el.contains(top) && !top.contains(el)) {
  return { status: 'obscured', detail: describe(top) };
}
return { status: 'ok', x, y };
"#,
    )
}

/// Click the first visible element matching `query` through the DOM,
/// regardless of what is stacked on top. Evaluates to a boolean.
pub fn force_click(query: &ElementQuery) -> String {
    let arg = serde_json::to_value(query).unwrap_or_else(|_| json!({ "css": query.css }));
    iife(
        arg,
        r#"
const exclude = arg.exclude_text || [];
const el = queryAll(arg.css).filter(visible).find((el) => {
  const t = textOf(el);
  if (arg.text) {
    const ok = arg.text.mode === 'exact' ? t === arg.text.text : t.includes(arg.text.text);
    if (!ok) return false;
  }
  return !exclude.some((x) => t.includes(x));
});
if (!el) return false;
el.click();
return true;
"#,
    )
}

/// Set the value of the first visible match and fire `input` and `change`.
pub fn fill(target: &FillTarget<'_>, value: &str) -> String {
    let arg = match target {
        FillTarget::Selector(s) => json!({ "kind": "selector", "selector": s, "value": value }),
        FillTarget::Placeholder(p) => json!({ "kind": "placeholder", "placeholder": p, "value": value }),
        FillTarget::FirstInput => json!({ "kind": "first_input", "value": value }),
    };
    iife(
        arg,
        r#"
const fields = 'input:not([type=hidden]):not([type=submit]):not([type=button]):not([type=checkbox]):not([type=radio]), textarea';
const els = arg.kind === 'selector' ? bySelector(arg.selector)
  : arg.kind === 'placeholder'
    ? queryAll('input, textarea').filter((el) => lower(el.getAttribute('placeholder')).includes(lower(arg.placeholder)))
    : queryAll(fields);
if (!els.length) return { status: 'none' };
const shown = els.filter(visible);
if (!shown.length) return { status: 'hidden' };
const el = shown[0];
if (el.disabled || el.readOnly) return { status: 'disabled' };
el.focus();
if (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement) {
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) desc.set.call(el, arg.value); else el.value = arg.value;
} else if (el.isContentEditable) {
  el.textContent = arg.value;
} else {
  return { status: 'unfillable', detail: describe(el) };
}
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return { status: 'ok' };
"#,
    )
}

/// Choose an option of the first visible `<select>` match, by value or by
/// visible label.
pub fn select(selector: &str, choice: &str, by_label: bool) -> String {
    iife(
        json!({ "selector": selector, "choice": choice, "by_label": by_label }),
        r#"
const els = bySelector(arg.selector);
if (!els.length) return { status: 'none' };
const shown = els.filter(visible);
if (!shown.length) return { status: 'hidden' };
const el = shown[0];
if (!(el instanceof HTMLSelectElement)) return { status: 'unfillable', detail: describe(el) };
if (el.disabled) return { status: 'disabled' };
const want = String(arg.choice).trim();
const opt = Array.from(el.options).find((o) => arg.by_label
  ? o.label.trim() === want || o.text.trim() === want
  : o.value === arg.choice);
if (!opt) return { status: 'no_option' };
el.value = opt.value;
opt.selected = true;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return { status: 'ok' };
"#,
    )
}

/// Number of visible elements matching `selector`.
pub fn count_visible(selector: &str) -> String {
    iife(json!(selector), "return bySelector(arg).filter(visible).length;")
}

/// Visible interactive elements as plain records.
pub fn interactive_elements() -> String {
    iife(
        json!("button, input, textarea, select, a, [onclick], [role='button']"),
        r#"
return queryAll(arg).filter(visible).map((el) => {
  const tag = el.tagName.toLowerCase();
  const canDisable = ['button', 'input', 'select', 'textarea'].includes(tag);
  return {
    tag,
    text: textOf(el).slice(0, 100),
    placeholder: el.getAttribute('placeholder') || '',
    id: el.id || '',
    class: typeof el.className === 'string' ? el.className : '',
    type: el.getAttribute('type') || '',
    disabled: canDisable ? Boolean(el.disabled) : false,
  };
});
"#,
    )
}

pub const VISIBLE_TEXT: &str = "document.body ? document.body.innerText : ''";

pub const SCROLL_TO_BOTTOM: &str =
    "(() => { window.scrollTo(0, document.body ? document.body.scrollHeight : 0); return true; })()";

pub fn scroll_by(pixels: i64) -> String {
    format!("(() => {{ window.scrollBy(0, {pixels}); return true; }})()")
}

/// One record from [`interactive_elements`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "class")]
    pub css_class: String,
    #[serde(default, rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub disabled: bool,
}
