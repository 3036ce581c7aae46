// ABOUTME: HTTP middleware applied ahead of the API routes

pub mod rate_limit;
