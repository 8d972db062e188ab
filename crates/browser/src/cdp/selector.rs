//! Playwright-style selector lists evaluated inside the page.
//!
//! Supported syntax: comma-separated alternatives of plain CSS in which
//! any compound may carry `:has-text("...")` clauses.  A clause filters the
//! element matched by its own compound: `div:has-text("Cart") .item` is an
//! `.item` inside a `div` whose text contains "Cart".  Text matching is a
//! case-insensitive substring match on whitespace-normalized `innerText`,
//! and results come back in document order without duplicates.

use serde::Serialize;

/// One alternative of a selector list, split after every compound that
/// carries text filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorPart {
    pub steps: Vec<Step>,
}

/// CSS resolved relative to the previous step's matches, then filtered
/// on the text of each match.
///
/// `css` of a later step may open with a combinator (`> li`, `+ a`); with
/// none it is a descendant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub css: String,
    pub has_text: Vec<String>,
}

const HAS_TEXT: &str = ":has-text(";

/// Split a selector list into its alternatives.
pub fn parse(selector: &str) -> Vec<SelectorPart> {
    split_top_level(selector)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_part)
        .collect()
}

/// Split on commas that are not inside quotes, brackets or parentheses.
fn split_top_level(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

fn parse_part(part: &str) -> SelectorPart {
    let mut steps: Vec<Step> = Vec::new();
    let mut rest = part;

    while let Some(pos) = rest.find(HAS_TEXT) {
        let css = &rest[..pos];
        let after = &rest[pos + HAS_TEXT.len()..];
        let (text, consumed) = read_argument(after);
        match steps.last_mut() {
            // `a:has-text(x):has-text(y)` filters the same compound twice.
            Some(step) if css.is_empty() => step.has_text.push(text),
            _ => steps.push(Step {
                css: compound(css),
                has_text: vec![text],
            }),
        }
        rest = &after[consumed..];
    }

    if steps.is_empty() || !rest.trim().is_empty() {
        steps.push(Step {
            css: compound(rest),
            has_text: Vec::new(),
        });
    }
    SelectorPart { steps }
}

/// Trimmed CSS for one step. A clause with no compound of its own
/// (`div :has-text(x)`, `ul > :has-text(x)`) applies to any element.
fn compound(css: &str) -> String {
    let trimmed = css.trim();
    if trimmed.is_empty() {
        return "*".into();
    }
    let open = css.ends_with(char::is_whitespace)
        || trimmed.ends_with(|c: char| matches!(c, '>' | '+' | '~'));
    if open {
        format!("{trimmed} *")
    } else {
        trimmed.into()
    }
}

/// Read a `:has-text(` argument up to and including the closing paren.
/// Returns the unquoted text and the number of bytes consumed.
fn read_argument(input: &str) -> (String, usize) {
    let trimmed = input.trim_start();
    let lead = input.len() - trimmed.len();

    let Some(q @ ('"' | '\'')) = trimmed.chars().next() else {
        return match trimmed.find(')') {
            Some(end) => (trimmed[..end].trim().to_string(), lead + end + 1),
            None => (trimmed.trim().to_string(), input.len()),
        };
    };

    let mut text = String::new();
    let mut escaped = false;
    for (i, c) in trimmed.char_indices().skip(1) {
        if escaped {
            text.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == q {
            let tail = &trimmed[i + 1..];
            let close = tail.find(')').map(|p| p + 1).unwrap_or(tail.len());
            return (text, lead + i + 1 + close);
        } else {
            text.push(c);
        }
    }
    (text, input.len())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-page scripts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const HEAD: &str = r#"(() => {
  const parts = "#;

const RESOLVE: &str = r#";
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const visible = (el) => {
    const r = el.getBoundingClientRect();
    return r.width > 0 && r.height > 0 && getComputedStyle(el).visibility !== 'hidden';
  };
  const MARK = 'data-cartrunner-scope';
  const resolve = (steps) => {
    let scope = null;
    for (const step of steps) {
      let nodes;
      if (scope === null) {
        nodes = document.querySelectorAll(step.css);
      } else {
        if (scope.length === 0) return [];
        scope.forEach((el) => el.setAttribute(MARK, ''));
        try {
          nodes = document.querySelectorAll('[' + MARK + '] ' + step.css);
        } finally {
          scope.forEach((el) => el.removeAttribute(MARK));
        }
      }
      scope = Array.from(nodes).filter((el) => {
        const text = norm(el.innerText || el.textContent);
        return step.has_text.every((t) => text.includes(norm(t)));
      });
    }
    return scope || [];
  };
  const found = [];
  for (const part of parts) {
    let matched;
    try {
      matched = resolve(part.steps);
    } catch (e) {
      throw new Error('invalid selector: ' + part.steps.map((s) => s.css).join(' '));
    }
    for (const el of matched) {
      if (!found.includes(el)) found.push(el);
    }
  }
  found.sort((a, b) => (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
"#;

const TAIL: &str = "\n})()";

fn script(selector: &str, body: &str) -> String {
    let parts = serde_json::to_string(&parse(selector)).unwrap_or_else(|_| "[]".into());
    let mut out = String::with_capacity(HEAD.len() + parts.len() + RESOLVE.len() + body.len() + TAIL.len());
    out.push_str(HEAD);
    out.push_str(&parts);
    out.push_str(RESOLVE);
    out.push_str(body);
    out.push_str(TAIL);
    out
}

/// Evaluates to the number of matching elements.
pub fn count_script(selector: &str) -> String {
    script(selector, "  return found.length;")
}

/// Evaluates to the number of matching *visible* elements.
pub fn visible_count_script(selector: &str) -> String {
    script(selector, "  return found.filter(visible).length;")
}

/// Sets the value of the first visible match and fires `input`/`change`.
/// Evaluates to `false` when nothing visible matches.
pub fn fill_script(selector: &str, value: &str) -> String {
    let value = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into());
    let body = format!(
        r#"  const el = found.find(visible);
  if (!el) return false;
  el.focus();
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
  setter.call(el, {value});
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;"#
    );
    script(selector, &body)
}

/// Scrolls the first visible match into view and evaluates to the centre
/// of its box as `{x, y}`, or `null`.
pub fn click_point_script(selector: &str) -> String {
    script(
        selector,
        r#"  const el = found.find(visible);
  if (!el) return null;
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const r = el.getBoundingClientRect();
  return { x: r.left + r.width / 2, y: r.top + r.height / 2 };"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(css: &str, texts: &[&str]) -> Step {
        Step {
            css: css.into(),
            has_text: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn part(css: &str, texts: &[&str]) -> SelectorPart {
        SelectorPart {
            steps: vec![step(css, texts)],
        }
    }

    #[test]
    fn plain_css_list() {
        assert_eq!(
            parse(r#"input[type="email"], input[name="email"]"#),
            vec![
                part(r#"input[type="email"]"#, &[]),
                part(r#"input[name="email"]"#, &[]),
            ]
        );
    }

    #[test]
    fn has_text_is_extracted() {
        assert_eq!(
            parse(r#"button[type="submit"], button:has-text("Sign In")"#),
            vec![
                part(r#"button[type="submit"]"#, &[]),
                part("button", &["Sign In"]),
            ]
        );
    }

    #[test]
    fn commas_inside_quotes_and_brackets_do_not_split() {
        assert_eq!(
            parse(r#"button:has-text("Yes, buy"), a[title="x,y"]"#),
            vec![part("button", &["Yes, buy"]), part(r#"a[title="x,y"]"#, &[])]
        );
    }

    #[test]
    fn bare_has_text_matches_any_element() {
        assert_eq!(parse(r#":has-text('Checkout')"#), vec![part("*", &["Checkout"])]);
    }

    #[test]
    fn text_filter_stays_on_its_own_compound() {
        assert_eq!(
            parse("div:has-text(Cart) .item:has-text(\"Add\")"),
            vec![SelectorPart {
                steps: vec![step("div", &["Cart"]), step(".item", &["Add"])],
            }]
        );
    }

    #[test]
    fn css_after_a_filtered_compound_is_a_separate_step() {
        assert_eq!(
            parse("ul.cart:has-text('Total') > li button"),
            vec![SelectorPart {
                steps: vec![step("ul.cart", &["Total"]), step("> li button", &[])],
            }]
        );
    }

    #[test]
    fn stacked_filters_share_a_compound() {
        assert_eq!(
            parse("button:has-text('Add'):has-text('Cart')"),
            vec![part("button", &["Add", "Cart"])]
        );
    }

    #[test]
    fn filter_without_compound_applies_to_any_element() {
        assert_eq!(
            parse("form :has-text('Buy')"),
            vec![part("form *", &["Buy"])]
        );
        assert_eq!(
            parse("div.a:has-text(x) > :has-text(y)"),
            vec![SelectorPart {
                steps: vec![step("div.a", &["x"]), step("> *", &["y"])],
            }]
        );
    }

    #[test]
    fn escaped_quote_in_text() {
        assert_eq!(
            parse(r#"button:has-text("Say \"hi\"")"#),
            vec![part("button", &[r#"Say "hi""#])]
        );
    }

    #[test]
    fn empty_alternatives_are_dropped() {
        assert_eq!(parse("a, , b,"), vec![part("a", &[]), part("b", &[])]);
    }

    #[test]
    fn fill_value_is_json_escaped() {
        let js = fill_script("input", "p\"w'd\n");
        assert!(js.contains(r#"setter.call(el, "p\"w'd\n");"#));
        assert!(js.starts_with("(() => {"));
        assert!(js.ends_with("})()"));
    }

    #[test]
    fn scripts_embed_parsed_parts() {
        let js = count_script(r#"button:has-text("Add to Cart")"#);
        assert!(js.contains(r#"[{"steps":[{"css":"button","has_text":["Add to Cart"]}]}]"#));
        assert!(js.contains("return found.length;"));
    }
}
