//! Android location backend using JNI on `LocationManager`.
//!
//! Live updates go through `feeling.location.LocationBridge`, a
//! `LocationListener` the host app ships (see `LocationBridge.kt` next to this
//! file). Each subscription owns one bridge instance; the bridge carries a
//! handle to the Rust delegate and calls back into
//! [`Java_feeling_location_LocationBridge_nativeOnLocation`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::sys::{jdouble, jint, jlong};
use jni::{JNIEnv, JavaVM};
use log::{error, warn};

use crate::{
    LocationBackend, LocationDelegate, LocationError, Position, Provider, ProviderReading,
    UpdateConfig,
};

const BRIDGE_CLASS: &str = "feeling/location/LocationBridge";

/// Provider constants (must match Kotlin).
const PROVIDER_GPS: jint = 0;
const PROVIDER_NETWORK: jint = 1;

type DelegateHandle = Arc<dyn LocationDelegate>;

const fn provider_to_jint(provider: Provider) -> jint {
    match provider {
        Provider::Gps => PROVIDER_GPS,
        Provider::Network => PROVIDER_NETWORK,
    }
}

const fn provider_from_jint(code: jint) -> Option<Provider> {
    match code {
        PROVIDER_GPS => Some(Provider::Gps),
        PROVIDER_NETWORK => Some(Provider::Network),
        _ => None,
    }
}

struct Subscription {
    bridge: GlobalRef,
    handle: jlong,
}

/// Location backend over an Android `Context`.
#[derive(Clone)]
pub struct AndroidLocationBackend {
    inner: Arc<Inner>,
}

struct Inner {
    vm: JavaVM,
    context: GlobalRef,
    bridge_class: GlobalRef,
    subscriptions: Mutex<HashMap<Provider, Subscription>>,
}

impl fmt::Debug for AndroidLocationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidLocationBackend").finish_non_exhaustive()
    }
}

impl AndroidLocationBackend {
    /// Create a backend for `context`.
    ///
    /// Must be called from a thread where the app's class loader can see
    /// `feeling.location.LocationBridge`, typically from a JNI call made by the
    /// host Activity.
    ///
    /// # Errors
    /// Returns a [`LocationError`] if the bridge class cannot be found or the
    /// global references cannot be created.
    pub fn new(env: &mut JNIEnv, context: &JObject) -> Result<Self, LocationError> {
        let vm = env
            .get_java_vm()
            .map_err(|e| LocationError::Platform(format!("get_java_vm failed: {e}")))?;

        let bridge_class = env
            .find_class(BRIDGE_CLASS)
            .map_err(|e| LocationError::Platform(format!("find {BRIDGE_CLASS}: {e}")))?;
        let bridge_class = env
            .new_global_ref(bridge_class)
            .map_err(|e| LocationError::Platform(format!("new_global_ref: {e}")))?;

        let context = env
            .new_global_ref(context)
            .map_err(|e| LocationError::Platform(format!("new_global_ref: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                vm,
                context,
                bridge_class,
                subscriptions: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn with_manager<R>(
        &self,
        f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<R>,
    ) -> Result<R, LocationError> {
        let mut env = self
            .inner
            .vm
            .attach_current_thread()
            .map_err(|e| LocationError::Platform(format!("attach_current_thread: {e}")))?;

        let result = location_manager(&mut env, self.inner.context.as_obj())
            .and_then(|manager| f(&mut env, &manager));

        result.map_err(|e| {
            // A thrown Java exception stays pending until cleared.
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            LocationError::Platform(e.to_string())
        })
    }

    /// Detach `subscription`'s bridge from the OS and free its delegate handle.
    ///
    /// The handle is leaked if the bridge cannot be released, since a late
    /// callback could still read it.
    fn release(&self, provider: Provider, subscription: &Subscription) {
        let released = self.with_manager(|env, manager| {
            env.call_method(
                manager,
                "removeUpdates",
                "(Landroid/location/LocationListener;)V",
                &[JValue::Object(subscription.bridge.as_obj())],
            )?;
            env.call_method(subscription.bridge.as_obj(), "release", "()V", &[])?;
            Ok(())
        });

        match released {
            // SAFETY: `release` is synchronized with `onLocationChanged` and
            // clears the bridge's handle, so no callback can still use it.
            Ok(()) => drop(unsafe { Box::from_raw(subscription.handle as *mut DelegateHandle) }),
            Err(err) => {
                error!("removing {provider} location updates failed, leaking delegate: {err}");
            }
        }
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<Provider, Subscription>> {
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn location_manager<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
) -> jni::errors::Result<JObject<'local>> {
    let service = env.new_string("location")?;
    env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&service)],
    )?
    .l()
}

impl LocationBackend for AndroidLocationBackend {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        let enabled = self.with_manager(|env, manager| {
            let name = env.new_string(provider.name())?;
            env.call_method(
                manager,
                "isProviderEnabled",
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&name)],
            )?
            .z()
        });

        enabled.unwrap_or_else(|err| {
            warn!("isProviderEnabled({provider}) failed: {err}");
            false
        })
    }

    fn subscribe(
        &self,
        provider: Provider,
        config: &UpdateConfig,
        delegate: Arc<dyn LocationDelegate>,
    ) -> Result<(), LocationError> {
        self.unsubscribe(provider);

        let handle = Box::into_raw(Box::new(delegate)) as jlong;
        let min_time = jlong::try_from(config.min_interval.as_millis()).unwrap_or(jlong::MAX);
        let bridge_class: &JClass = self.inner.bridge_class.as_obj().into();

        let bridge = self.with_manager(|env, _manager| {
            let bridge = env.new_object(
                bridge_class,
                "(JI)V",
                &[JValue::Long(handle), JValue::Int(provider_to_jint(provider))],
            )?;
            env.new_global_ref(bridge)
        });
        let bridge = match bridge {
            Ok(bridge) => bridge,
            Err(err) => {
                // SAFETY: no bridge holding the handle exists, so no callback
                // can reach it.
                drop(unsafe { Box::from_raw(handle as *mut DelegateHandle) });
                return Err(LocationError::SubscriptionFailed {
                    provider,
                    reason: err.to_string(),
                });
            }
        };

        let registered = self.with_manager(|env, manager| {
            let name = env.new_string(provider.name())?;
            let looper = env
                .call_static_method(
                    "android/os/Looper",
                    "getMainLooper",
                    "()Landroid/os/Looper;",
                    &[],
                )?
                .l()?;
            env.call_method(
                manager,
                "requestLocationUpdates",
                "(Ljava/lang/String;JFLandroid/location/LocationListener;Landroid/os/Looper;)V",
                &[
                    JValue::Object(&name),
                    JValue::Long(min_time),
                    JValue::Float(config.min_distance_m),
                    JValue::Object(bridge.as_obj()),
                    JValue::Object(&looper),
                ],
            )?;
            Ok(())
        });

        match registered {
            Ok(()) => {
                self.subscriptions()
                    .insert(provider, Subscription { bridge, handle });
                Ok(())
            }
            Err(err) => {
                self.release(provider, &Subscription { bridge, handle });
                Err(LocationError::SubscriptionFailed {
                    provider,
                    reason: err.to_string(),
                })
            }
        }
    }

    fn unsubscribe(&self, provider: Provider) {
        let Some(subscription) = self.subscriptions().remove(&provider) else {
            return;
        };
        self.release(provider, &subscription);
    }

    fn last_known_location(&self, provider: Provider) -> Option<Position> {
        let location = self.with_manager(|env, manager| {
            let name = env.new_string(provider.name())?;
            let location = env
                .call_method(
                    manager,
                    "getLastKnownLocation",
                    "(Ljava/lang/String;)Landroid/location/Location;",
                    &[JValue::Object(&name)],
                )?
                .l()?;
            if location.is_null() {
                return Ok(None);
            }
            let latitude = env.call_method(&location, "getLatitude", "()D", &[])?.d()?;
            let longitude = env.call_method(&location, "getLongitude", "()D", &[])?.d()?;
            Ok(Some(Position::new(latitude, longitude)))
        });

        location.unwrap_or_else(|err| {
            warn!("getLastKnownLocation({provider}) failed: {err}");
            None
        })
    }
}

/// Called by `LocationBridge.onLocationChanged`.
#[unsafe(no_mangle)]
pub extern "system" fn Java_feeling_location_LocationBridge_nativeOnLocation(
    _env: JNIEnv,
    _this: JObject,
    handle: jlong,
    provider: jint,
    latitude: jdouble,
    longitude: jdouble,
) {
    if handle == 0 {
        return;
    }
    let Some(provider) = provider_from_jint(provider) else {
        warn!("location from unknown provider code {provider}");
        return;
    };

    // SAFETY: non-zero handles come from `Box::into_raw` in `subscribe` and
    // are freed only after the bridge has been released.
    let delegate = unsafe { &*(handle as *const DelegateHandle) };
    delegate.on_reading(ProviderReading {
        provider,
        position: Position::new(latitude, longitude),
    });
}
