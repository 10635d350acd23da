pub mod stored_file;
