//! Pages synthesized in-process rather than read from the document root.

use bytes::Bytes;

pub const REGISTER_FORM: Bytes = Bytes::from_static(
    b"<!DOCTYPE html>\n<html><head><title>Register</title></head><body>\n\
<form action=\"/register\" method=\"post\">\n\
<input type=\"text\" name=\"user\" placeholder=\"user\" required>\n\
<input type=\"password\" name=\"password\" placeholder=\"password\" required>\n\
<button type=\"submit\">Register</button>\n\
</form>\n<a href=\"/login\">Already registered? Log in</a>\n</body></html>\n",
);

pub const LOGIN_FORM: Bytes = Bytes::from_static(
    b"<!DOCTYPE html>\n<html><head><title>Log in</title></head><body>\n\
<form action=\"/login\" method=\"post\">\n\
<input type=\"text\" name=\"user\" placeholder=\"user\" required>\n\
<input type=\"password\" name=\"password\" placeholder=\"password\" required>\n\
<button type=\"submit\">Log in</button>\n\
</form>\n<a href=\"/register\">New here? Register</a>\n</body></html>\n",
);

pub const WELCOME: Bytes = Bytes::from_static(
    b"<!DOCTYPE html>\n<html><head><title>Welcome</title></head><body>\n\
<h1>Welcome</h1>\n\
<a href=\"/picture\">Pictures</a> <a href=\"/video\">Videos</a> <a href=\"/fans\">Fans</a>\n\
</body></html>\n",
);

pub const REGISTER_ERROR: Bytes = Bytes::from_static(
    b"<!DOCTYPE html>\n<html><head><title>Register</title></head><body>\n\
<p>That user name is already taken.</p>\n<a href=\"/register\">Try again</a>\n\
</body></html>\n",
);

pub const LOGIN_ERROR: Bytes = Bytes::from_static(
    b"<!DOCTYPE html>\n<html><head><title>Log in</title></head><body>\n\
<p>Wrong user name or password.</p>\n<a href=\"/login\">Try again</a>\n\
</body></html>\n",
);

/// Served for a zero-length file, which cannot be memory-mapped.
pub const EMPTY_FILE: Bytes = Bytes::from_static(b"<html><body></body></html>");
