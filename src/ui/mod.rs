pub mod live_display;
