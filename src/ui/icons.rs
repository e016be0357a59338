//! Emoji used in terminal output, with plain-text fallbacks.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "-");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static REPO: Emoji<'_, '_> = Emoji("📦 ", "");
pub static CHAT: Emoji<'_, '_> = Emoji("💬 ", ">");
pub static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "-");
