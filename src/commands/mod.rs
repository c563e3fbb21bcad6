// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod allocations;
pub mod assets;
pub mod doctor;
pub mod importer;
pub mod portfolio;
pub mod prices;
pub mod settings;
pub mod transactions;
