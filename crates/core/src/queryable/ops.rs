//! Verb helpers used by resource wrappers

use querykit_domain::{HttpMethod, RequestInit};
use serde::Serialize;

use super::{Execution, Queryable};

impl Queryable {
    pub fn get(&self) -> Execution {
        self.invoke_with(RequestInit::get())
    }

    /// Invokes with `init`, forcing the method to `POST`.
    pub fn post(&self, init: RequestInit) -> Execution {
        self.invoke_with(with_method(init, HttpMethod::Post))
    }

    pub fn put(&self, init: RequestInit) -> Execution {
        self.invoke_with(with_method(init, HttpMethod::Put))
    }

    pub fn patch(&self, init: RequestInit) -> Execution {
        self.invoke_with(with_method(init, HttpMethod::Patch))
    }

    pub fn delete(&self, init: RequestInit) -> Execution {
        self.invoke_with(with_method(init, HttpMethod::Delete))
    }

    /// Posts `body` serialized as JSON.
    pub fn post_json<T: Serialize>(&self, body: &T) -> Execution {
        self.send_json(HttpMethod::Post, body)
    }

    pub fn patch_json<T: Serialize>(&self, body: &T) -> Execution {
        self.send_json(HttpMethod::Patch, body)
    }

    fn send_json<T: Serialize>(&self, method: HttpMethod, body: &T) -> Execution {
        match RequestInit::new(method).json(body) {
            Ok(init) => self.invoke_with(init),
            Err(error) => Execution::rejected(error),
        }
    }
}

fn with_method(mut init: RequestInit, method: HttpMethod) -> RequestInit {
    init.method = method;
    init
}
