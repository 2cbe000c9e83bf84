pub mod bar;
pub mod de;
