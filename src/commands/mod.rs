// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod categories;
pub mod methods;
pub mod transactions;
pub mod cycles;
pub mod cards;
pub mod installments;
pub mod taxes;
pub mod exporter;
pub mod doctor;
