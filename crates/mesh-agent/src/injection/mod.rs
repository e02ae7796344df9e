// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dependency injection engine

pub mod function;
pub mod injector;
pub mod local;
pub mod registry;

pub use function::{
    AwaitableInjectable, BlockingInjectable, CallMode, Dependencies, FunctionKey, Injectable,
    Overrides,
};
pub use injector::DependencyInjector;
pub use local::LocalCapability;
pub use registry::{DependencyKey, DependencyRegistry};
