mod support;

#[cfg(unix)]
mod conversion;
mod lifecycle;
