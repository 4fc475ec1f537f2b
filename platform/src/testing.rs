//! Log capture shared by the unit tests. Lines are kept per test thread.

use crate::logging::{self, Console};
use log::LevelFilter;
use std::{cell::RefCell, string::String, sync::Once, vec::Vec};

std::thread_local! {
    static LINES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct CaptureConsole;

impl Console for CaptureConsole {
    fn write_line(&self, line: &str) {
        LINES.with(|lines| lines.borrow_mut().push(String::from(line)));
    }
}

static CAPTURE: CaptureConsole = CaptureConsole;

/// Install the capturing logger once per process and drop anything this thread logged so far.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        logging::init(&CAPTURE, LevelFilter::Trace).expect("logger already installed");
    });
    take_lines();
}

pub fn take_lines() -> Vec<String> {
    LINES.with(|lines| lines.borrow_mut().drain(..).collect())
}

pub fn count(lines: &[String], level: &str) -> usize {
    let tag = std::format!("[{}]", level);
    lines.iter().filter(|line| line.contains(&tag)).count()
}
