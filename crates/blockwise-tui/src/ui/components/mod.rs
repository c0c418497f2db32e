pub mod editor_input;
pub mod tab_bar;
