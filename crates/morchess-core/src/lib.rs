pub mod db;
pub mod editor;
pub mod keybinds;
pub mod ui;
