//! Operator facing status lines. Everything goes to stdout; failures are marked in red so they
//! stand out between ordinary notices.

use std::fmt::Display;

use ansi_term::Colour;

pub fn notice(message: impl Display) {
    println!("{} {message}", Colour::Cyan.bold().paint("::"));
}

pub fn success(message: impl Display) {
    println!("{} {message}", Colour::Green.bold().paint("::"));
}

pub fn stats(message: impl Display) {
    println!("{} {message}", Colour::Purple.paint("::"));
}

pub fn failure(message: impl Display) {
    println!("{} {message}", Colour::Red.bold().paint("error:"));
}
