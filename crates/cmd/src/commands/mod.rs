// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod delete;
pub mod get;
pub mod list;
pub mod mkdir;
pub mod put;
pub mod rmdir;
pub mod stat;

pub use delete::delete_command;
pub use get::get_command;
pub use list::list_command;
pub use mkdir::mkdir_command;
pub use put::put_command;
pub use rmdir::rmdir_command;
pub use stat::stat_command;
