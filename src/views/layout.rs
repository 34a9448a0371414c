// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page shell: header, navbar, footer and the two layouts.

use maud::{html, Markup, PreEscaped, DOCTYPE};

pub const SITE_TITLE: &str = "Memory Keeper";
const SITE_DESCRIPTION: &str = "Keep your memories safe and organized";

const NAV_LINKS: [(&str, &str); 4] = [
    ("/", "Home"),
    ("/about", "About"),
    ("/timeline", "Timeline"),
    ("/chat", "Chat"),
];

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; color: #111827; background: #f9fafb; }
.site-header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; background: #fff; }
.site-header img { width: 150px; height: auto; }
.site-nav ul { display: flex; gap: 1.5rem; list-style: none; margin: 0; padding: 0.75rem 2rem; background: #ecfdf5; }
.site-nav a { color: #065f46; text-decoration: none; font-weight: 500; }
main { max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
.site-footer { text-align: center; padding: 2rem; color: #6b7280; }
.card { background: #fff; border-radius: 0.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.1); padding: 1.5rem; }
.field { margin-bottom: 1rem; }
.field label { display: block; font-size: 0.875rem; font-weight: 500; margin-bottom: 0.25rem; }
.field input { width: 100%; box-sizing: border-box; padding: 0.5rem 0.75rem; border: 1px solid #d1d5db; border-radius: 0.375rem; }
.button { display: inline-block; padding: 0.5rem 1rem; border: 0; border-radius: 0.375rem; background: #4f46e5; color: #fff; text-decoration: none; cursor: pointer; }
.button:disabled { opacity: 0.5; cursor: not-allowed; }
.button.danger { background: #dc2626; }
.error { background: #fef2f2; color: #b91c1c; padding: 0.75rem 1rem; border-radius: 0.375rem; }
.notice { background: #f0fdf4; color: #166534; padding: 0.75rem 1rem; border-radius: 0.375rem; }
details { margin-top: 1rem; }
.hint { font-size: 0.875rem; color: #6b7280; }
.hint.ok { color: #16a34a; }
.hint.bad { color: #dc2626; }
"#;

pub fn header() -> Markup {
    html! {
        header class="site-header" aria-label="Site header" {
            a href="/" {
                img src="/assets/logo.jpg" alt="MyMemories Logo" width="150" height="110";
            }
            h1 { "MyMemories" }
        }
    }
}

pub fn navbar() -> Markup {
    html! {
        nav class="site-nav" {
            ul {
                @for (href, label) in NAV_LINKS {
                    li { a href=(href) { (label) } }
                }
            }
        }
    }
}

pub fn footer() -> Markup {
    html! {
        footer class="site-footer" {
            p { "Created with 💚" }
        }
    }
}

fn document(title: &str, with_nav: bool, content: Markup) -> Markup {
    let full_title = if title.is_empty() {
        SITE_TITLE.to_string()
    } else {
        format!("{} | {}", title, SITE_TITLE)
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                meta name="description" content=(SITE_DESCRIPTION);
                title { (full_title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                (header())
                @if with_nav {
                    (navbar())
                }
                main { (content) }
                (footer())
            }
        }
    }
}

/// Layout for signed-in pages.
pub fn main_layout(title: &str, content: Markup) -> Markup {
    document(title, true, content)
}

/// Layout for sign-in pages (no navbar).
pub fn auth_layout(title: &str, content: Markup) -> Markup {
    document(title, false, content)
}
