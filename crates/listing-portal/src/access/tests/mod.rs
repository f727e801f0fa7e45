mod common;
mod permission;
