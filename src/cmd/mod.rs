//! CLI command implementations.
//!
//! | Module      | Commands handled                                         |
//! |-------------|----------------------------------------------------------|
//! | `serve`     | `Serve`                                                  |
//! | `auth`      | `Login`, `Signup`, `Logout`                              |
//! | `reference` | `Equipment`, `Teams`                                     |
//! | `requests`  | `List`, `Board`, `Show`, `Create`, `Move`, `Edit`, `Delete` |
//! | `config`    | `Config`                                                 |

pub mod auth;
pub mod config;
pub mod reference;
pub mod requests;
pub mod serve;
mod workspace;

pub use auth::{cmd_login, cmd_logout, cmd_signup};
pub use config::cmd_config;
pub use reference::{cmd_equipment, cmd_teams};
pub use requests::{cmd_board, cmd_create, cmd_delete, cmd_edit, cmd_list, cmd_move, cmd_show};
pub use serve::cmd_serve;
