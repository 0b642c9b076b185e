use crate::catalog::CatalogRecord;
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

fn ansi(color: AnsiColor) -> Style {
    Style::new().bold().fg_color(Some(Color::Ansi(color)))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(ansi(AnsiColor::Green).underline())
        .header(ansi(AnsiColor::Green).underline())
        .literal(ansi(AnsiColor::Yellow))
        .invalid(ansi(AnsiColor::Red))
        .error(ansi(AnsiColor::Red))
        .valid(ansi(AnsiColor::Green))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color::Rgb { r, g, b }
    }

    pub const GREEN: Color = rgb(45, 160, 60);
    pub const MOSS: Color = rgb(120, 200, 110);
    pub const GOLD: Color = rgb(230, 190, 60);
    pub const ORANGE: Color = rgb(255, 165, 0);
    pub const RED: Color = rgb(255, 85, 85);
    pub const BLUE: Color = rgb(100, 149, 237);
    pub const DIM: Color = rgb(128, 128, 128);
    pub const WHITE: Color = rgb(255, 255, 255);
}

const RULE: &str = "─";
const NOTE: &str = "♪";
const BULLET: &str = "●";
const BULLET_EMPTY: &str = "○";

// ═══════════════════════════════════════════════════════════════════════════════
// Messages
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_banner() {
    let title = "♪  S E S S I O N   C H O R D S  ♪";
    println!();
    println!("  {}", title.with(colors::GREEN).bold());
    println!("  {}", "═".repeat(title.width()).with(colors::DIM));
    println!();
}

pub fn print_success(message: &str) {
    println!(" {} {}", "✓".with(colors::GREEN).bold(), message.with(colors::GREEN));
}

pub fn print_error(message: &str) {
    eprintln!(" {} {}", "✗".with(colors::RED).bold(), message.with(colors::RED));
}

pub fn print_warning(message: &str) {
    println!(" {} {}", "⚠".with(colors::ORANGE).bold(), message.with(colors::ORANGE));
}

pub fn print_info(message: &str) {
    println!(" {} {}", "ℹ".with(colors::BLUE).bold(), message.with(colors::BLUE));
}

pub fn print_goodbye() {
    println!();
    println!("  {}", "Slán go fóill!".with(colors::GREEN).bold());
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Chart Display
// ═══════════════════════════════════════════════════════════════════════════════

const CHART_WIDTH: usize = 60;

/// Title line of a single chart: a note, the title, then a rule to the
/// chart width.
pub fn print_section_header(title: &str) {
    let rule = CHART_WIDTH.saturating_sub(title.width() + 3);
    println!();
    println!(
        "{} {} {}",
        NOTE.with(colors::GREEN).bold(),
        title.with(colors::GOLD).bold().attribute(Attribute::Italic),
        RULE.repeat(rule).with(colors::GREEN)
    );
}

pub fn print_section_footer() {
    println!("{}", RULE.repeat(CHART_WIDTH).with(colors::GREEN));
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        BULLET.with(colors::MOSS),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

/// A named chord section: the name on its own line, measures below.
pub fn print_chord_section(name: &str, progression: &str) {
    println!("  {}", name.with(colors::GOLD).bold());
    println!("      {}", progression.with(colors::WHITE));
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

fn pad(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}

/// One line per chart: title, then key, time and type, then the id.
///
/// Hidden charts are listed dimmed.
pub fn print_chart_list(records: &[CatalogRecord]) {
    if records.is_empty() {
        print_empty_list("No charts");
        return;
    }
    let title_width = records.iter().map(|r| r.title.width()).max().unwrap_or(0);
    let meta: Vec<String> = records
        .iter()
        .map(|r| format!("{} {} {}", r.key, r.time_signature, r.style_type))
        .collect();
    let meta_width = meta.iter().map(|m| m.width()).max().unwrap_or(0);

    for (record, meta) in records.iter().zip(&meta) {
        let (marker, title) = if record.hidden {
            (BULLET_EMPTY.with(colors::DIM), pad(&record.title, title_width).with(colors::DIM))
        } else {
            (BULLET.with(colors::MOSS), pad(&record.title, title_width).with(colors::WHITE))
        };
        println!(
            "  {} {}  {}  {}",
            marker,
            title,
            pad(meta, meta_width).with(colors::GOLD),
            record.id.as_str().with(colors::DIM)
        );
    }
    println!(
        "  {}",
        format!("{} chart(s)", records.len()).with(colors::DIM)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prompt
// ═══════════════════════════════════════════════════════════════════════════════

/// Green note when reads hit the remote index, orange when they come from
/// the local cache.
pub fn get_prompt(connected: bool, charts: usize) -> String {
    let marker = if connected {
        NOTE.with(colors::GREEN).bold()
    } else {
        NOTE.with(colors::ORANGE).bold()
    };
    format!(
        "{} {}{} ",
        marker,
        charts.to_string().with(colors::DIM),
        "❯".with(colors::MOSS).bold()
    )
}
