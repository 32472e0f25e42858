//! Shared UI icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Outcome indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static UNDO: Emoji<'_, '_> = Emoji("↩️  ", "[UNDO]");

// Board indicators
pub static CARD: Emoji<'_, '_> = Emoji("▪ ", "- ");
pub static SYNC: Emoji<'_, '_> = Emoji("🔄 ", "[~]");
pub static WRENCH: Emoji<'_, '_> = Emoji("🔧 ", "");
pub static CALENDAR: Emoji<'_, '_> = Emoji("📅 ", "");
pub static USER: Emoji<'_, '_> = Emoji("👤 ", "");
