mod test_breaker;
mod test_engine;
mod test_sleep;
