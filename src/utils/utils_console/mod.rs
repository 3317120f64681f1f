use colored::Colorize;
use serde::{Serialize, Deserialize};

/// Prints the given string with the given color.
///
/// ## Example
/// ```
/// use cio_trajopt::utils::utils_console::{trajopt_print, PrintMode, PrintColor};
/// trajopt_print("test", PrintMode::Print, PrintColor::Blue, false);
/// ```
pub fn trajopt_print(s: &str, mode: PrintMode, color: PrintColor, bolded: bool) {
    let mut string = match &color {
        PrintColor::None => { s.normal() }
        _ => {
            let c = color.get_color_triple();
            s.truecolor(c.0, c.1, c.2)
        }
    };
    if bolded { string = string.bold(); }
    match mode {
        PrintMode::Println => { println!("{}", string); }
        PrintMode::Print => { print!("{}", string); }
    }
}

/// Enum that is used in the trajopt_print function.
/// Println will cause a new line after each line, while Print will not.
#[derive(Clone, Debug)]
pub enum PrintMode {
    Println,
    Print
}

/// Defines color for a trajopt print command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintColor {
    None,
    Blue,
    Green,
    Red,
    Yellow,
    Cyan,
    Magenta
}
impl PrintColor {
    pub fn get_color_triple(&self) -> (u8, u8, u8) {
        match self {
            PrintColor::None => { (0,0,0) }
            PrintColor::Blue => { return (0, 0, 255) }
            PrintColor::Green => { return (0, 255, 0) }
            PrintColor::Red => { return (255, 0, 0) }
            PrintColor::Yellow => { return (255, 255, 0) }
            PrintColor::Cyan => { return (0, 255, 255) }
            PrintColor::Magenta => { return (255, 0, 255) }
        }
    }
}

/// Controls how chatty the planner is on the console.  `Summary` prints one line per
/// planning stage, `Iterations` additionally traces every optimizer iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrajoptDebug {
    Silent,
    Summary,
    Iterations
}
impl TrajoptDebug {
    pub fn prints_summary(&self) -> bool {
        *self >= TrajoptDebug::Summary
    }
    pub fn prints_iterations(&self) -> bool {
        *self >= TrajoptDebug::Iterations
    }
}
impl Default for TrajoptDebug {
    fn default() -> Self { Self::Summary }
}

/// Prints a yellow warning line, used when the planner degrades gracefully.
pub fn trajopt_print_warning(s: &str, debug: TrajoptDebug) {
    if debug.prints_summary() {
        trajopt_print(&format!("WARNING: {}", s), PrintMode::Println, PrintColor::Yellow, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_levels_are_ordered() {
        assert!(!TrajoptDebug::Silent.prints_summary());
        assert!(TrajoptDebug::Summary.prints_summary());
        assert!(!TrajoptDebug::Summary.prints_iterations());
        assert!(TrajoptDebug::Iterations.prints_iterations());
    }
}
