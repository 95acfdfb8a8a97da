mod test_raw_backend;
mod test_signers;
