mod debounce;

pub use debounce::DebouncedWriter;
