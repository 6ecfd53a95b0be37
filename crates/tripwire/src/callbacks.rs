// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::define_fn_wrapper::define_fn_wrapper;
use crate::{BreakerOptions, Counts, OnStateChangeArgs};

define_fn_wrapper!(TripPredicate(Fn(counts: &Counts) -> bool));
define_fn_wrapper!(IsSuccessful<E>(Fn(error: &E) -> bool));
define_fn_wrapper!(OnStateChange(Fn(args: OnStateChangeArgs<'_>)));
define_fn_wrapper!(OptionsFactory<E>(Fn(name: &str) -> BreakerOptions<E>));
