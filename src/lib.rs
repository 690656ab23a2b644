// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

pub mod article;
pub mod check;
pub mod config;
pub mod fragments;
pub mod generator;
pub mod handler;
pub mod markdown;
pub mod overrides;
pub mod page;
pub mod sitemap;
pub mod template;
