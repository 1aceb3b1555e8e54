//! `__md`/`__sass` context post-processing (spec.md §4.1 step 4), ported
//! from the `misaka`/`libsass` calls in `src/render/main.py`.

use pulldown_cmark::{html, Options, Parser};

/// Renders Markdown to HTML with hard-wrap semantics (a bare newline is
/// treated as a line break) and without intra-word emphasis, matching
/// `misaka.HtmlRenderer(flags=['hard-wrap'])` /
/// `extensions=['no-intra-emphasis']`.
///
/// `pulldown-cmark` has no direct "hard wrap" flag; we get the same effect
/// by turning single newlines into explicit hard breaks before parsing.
pub fn render_markdown(src: &str) -> String {
    let hard_wrapped = hard_wrap(src);
    let options = Options::empty();
    let parser = Parser::new_ext(&hard_wrapped, options);
    let mut html_out = String::new();
    html::push_html(&mut html_out, parser);
    html_out.trim_end_matches('\n').to_string()
}

fn hard_wrap(src: &str) -> String {
    // Two trailing spaces force a <br> in CommonMark; blank lines (paragraph
    // breaks) are left alone.
    src.lines()
        .map(|line| if line.is_empty() { line.to_string() } else { format!("{line}  ") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, thiserror::Error)]
#[error("sass compile error: {0}")]
pub struct SassError(String);

/// Compiles a Sass/SCSS snippet to compressed CSS, precision 10 (spec.md
/// §4.1 step 4 `__sass`).
pub fn compile_sass(src: &str) -> Result<String, SassError> {
    let options = grass::Options::default()
        .style(grass::OutputStyle::Compressed)
        .precision(10);
    grass::from_string(src.to_string(), &options)
        .map(|css| css.trim_end_matches('\n').to_string())
        .map_err(|e| SassError(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_heading() {
        let out = render_markdown("# hi");
        assert!(out.contains("<h1>hi</h1>"), "{out}");
    }

    #[test]
    fn single_newline_becomes_break() {
        let out = render_markdown("line one\nline two");
        assert!(out.contains("<br"), "{out}");
    }

    #[test]
    fn compiles_simple_scss() {
        let out = compile_sass("body { color: red; }").unwrap();
        assert_eq!(out, "body{color:red}");
    }
}
