pub mod grid;
pub mod inpaint;
pub mod layout;
pub mod upsample;
