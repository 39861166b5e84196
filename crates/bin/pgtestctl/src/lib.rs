pub mod args;
pub mod cmd;
pub mod ui;

#[cfg(test)]
mod test_utils;
