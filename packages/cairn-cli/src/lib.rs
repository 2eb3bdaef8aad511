//! Shared command-line surface for the Cairn binaries.

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};

/// `<package version>-<git sha>-<target triple>`, stamped by the workspace build script.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

/// Help output palette used by every Cairn binary.
pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD | Effects::UNDERLINE)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
		.valid(AnsiColor::Cyan.on_default())
		.invalid(AnsiColor::Red.on_default())
}
